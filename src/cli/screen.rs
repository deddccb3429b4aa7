use super::ui::{self, StyleType};
use crate::core::config::AppConfig;
use crate::core::{ConverterScreen, CurrencyCode, Phase, RateProvider, ScreenEvent, ScreenState};
use anyhow::{Result, anyhow};
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

const HELP: &str = "\
Commands:
  amount <value>   set the amount to convert
  from <CODE>      select the base currency
  to <CODE>        select the target currency
  convert          convert the amount (an empty line does the same)
  refresh          fetch the current rate again
  list             show available currencies
  help             show this help
  quit             leave";

/// One line of user input on the interactive screen.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Amount(String),
    From(CurrencyCode),
    To(CurrencyCode),
    Convert,
    Refresh,
    List,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, arg) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(w, a)| (w, a.trim()));

        match (word.to_lowercase().as_str(), arg) {
            ("" | "convert" | "c", "") => Ok(Command::Convert),
            ("amount" | "a", "") => Err(anyhow!("Usage: amount <value>")),
            ("amount" | "a", value) => Ok(Command::Amount(value.to_string())),
            ("from" | "f", code) => Ok(Command::From(code.parse()?)),
            ("to" | "t", code) => Ok(Command::To(code.parse()?)),
            ("refresh" | "r", "") => Ok(Command::Refresh),
            ("list" | "l", "") => Ok(Command::List),
            ("help" | "h" | "?", "") => Ok(Command::Help),
            ("quit" | "q" | "exit", "") => Ok(Command::Quit),
            _ => Err(anyhow!("Unknown command: {}. Type 'help' for commands", line)),
        }
    }
}

/// Builds a screen seeded with the configured pair, amount and format.
pub fn new_screen(
    provider: Arc<dyn RateProvider>,
    config: &AppConfig,
    base: Option<CurrencyCode>,
    target: Option<CurrencyCode>,
    amount: Option<&str>,
) -> ConverterScreen {
    ConverterScreen::new(
        provider,
        config.reference_currency.clone(),
        base.unwrap_or_else(|| config.base_currency.clone()),
        target.unwrap_or_else(|| config.target_currency.clone()),
        amount.unwrap_or(&config.amount),
        config.format.clone(),
    )
}

fn label_for(state: &ScreenState, code: &CurrencyCode) -> String {
    state
        .options
        .iter()
        .find(|o| &o.code == code)
        .map_or_else(|| code.to_string(), |o| o.label.clone())
}

pub fn render<W: Write>(state: &ScreenState, out: &mut W) -> Result<()> {
    let rate = match (state.phase, state.rate) {
        (Phase::Loading, _) => ui::style_text("loading...", StyleType::Subtle),
        (_, Some(rate)) => format!("1 {} = {} {}", state.base, rate, state.target),
        (_, None) => ui::style_text("N/A", StyleType::Subtle),
    };

    writeln!(out)?;
    writeln!(out, "{}", ui::style_text("Convert $", StyleType::Title))?;
    writeln!(out, "{} {}", ui::style_text("Amount: ", StyleType::Label), state.amount)?;
    writeln!(
        out,
        "{} {}",
        ui::style_text("Base:   ", StyleType::Label),
        label_for(state, &state.base)
    )?;
    writeln!(
        out,
        "{} {}",
        ui::style_text("Quote:  ", StyleType::Label),
        label_for(state, &state.target)
    )?;
    writeln!(out, "{} {}", ui::style_text("Rate:   ", StyleType::Label), rate)?;
    if let Some(result) = &state.result {
        writeln!(
            out,
            "{} {}",
            ui::style_text("Result: ", StyleType::Label),
            ui::style_text(&format!("{result} {}", state.target), StyleType::Result)
        )?;
    }
    Ok(())
}

pub fn report_events<W: Write>(
    events: &mut UnboundedReceiver<ScreenEvent>,
    out: &mut W,
) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        match event {
            ScreenEvent::OptionsFailed { error, .. } => writeln!(
                out,
                "{}",
                ui::style_text(
                    &format!("Error getting currency options. Please try again: {error}"),
                    StyleType::Error
                )
            )?,
            ScreenEvent::RateFailed { error, .. } => {
                let prefix = "Error getting latest conversion rate, please try again later";
                let message = format!("{prefix}: {error}");
                writeln!(out, "{}", ui::style_text(&message, StyleType::Error))?;
            }
            ScreenEvent::RateUnavailable { base, target } => writeln!(
                out,
                "{}",
                ui::style_text(
                    &format!("No rate available from {base} to {target}"),
                    StyleType::Warning
                )
            )?,
            ScreenEvent::OptionsLoaded { .. }
            | ScreenEvent::RateUpdated { .. }
            | ScreenEvent::StaleResponse { .. } => {}
        }
    }
    Ok(())
}

fn check_known<W: Write>(state: &ScreenState, code: &CurrencyCode, out: &mut W) -> Result<bool> {
    if state.options.is_empty() || state.options.iter().any(|o| &o.code == code) {
        return Ok(true);
    }
    writeln!(
        out,
        "{}",
        ui::style_text(&format!("Unknown currency: {code}"), StyleType::Error)
    )?;
    Ok(false)
}

fn write_options<W: Write>(state: &ScreenState, out: &mut W) -> Result<()> {
    if state.options.is_empty() {
        writeln!(
            out,
            "{}",
            ui::style_text("No currency options available", StyleType::Subtle)
        )?;
        return Ok(());
    }
    let labels: Vec<&str> = state.options.iter().map(|o| o.label.as_str()).collect();
    writeln!(out, "{}", labels.join(", "))?;
    Ok(())
}

async fn apply<W: Write>(
    screen: &mut ConverterScreen,
    command: Command,
    out: &mut W,
) -> Result<()> {
    match command {
        Command::Amount(amount) => screen.set_amount(&amount),
        Command::From(code) => {
            if check_known(screen.state(), &code, out)? {
                screen.select_base(code).await;
            }
        }
        Command::To(code) => {
            if check_known(screen.state(), &code, out)? {
                screen.select_target(code).await;
            }
        }
        Command::Convert => {
            screen.convert();
        }
        Command::Refresh => screen.refresh().await,
        Command::List => return write_options(screen.state(), out),
        Command::Help => {
            writeln!(out, "{HELP}")?;
            return Ok(());
        }
        Command::Quit => return Ok(()),
    }
    render(screen.state(), out)
}

/// Runs the interactive screen over `input`, writing everything to `out`.
pub async fn run_with<R, W>(screen: &mut ConverterScreen, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut events = screen.subscribe();

    let spinner = ui::new_spinner("Loading exchange rates...");
    screen.mount().await;
    spinner.finish_and_clear();

    report_events(&mut events, out)?;
    render(screen.state(), out)?;
    writeln!(
        out,
        "{}",
        ui::style_text("Type 'help' for commands", StyleType::Subtle)
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => apply(screen, command, out).await?,
            Err(e) => writeln!(out, "{}", ui::style_text(&e.to_string(), StyleType::Error))?,
        }
        report_events(&mut events, out)?;
    }
    Ok(())
}

pub async fn run(provider: Arc<dyn RateProvider>, config: &AppConfig) -> Result<()> {
    let mut screen = new_screen(provider, config, None, None, None);
    let stdin = BufReader::new(tokio::io::stdin());
    run_with(&mut screen, stdin, &mut std::io::stdout()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ExchangeRateApiProvider;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!("".parse::<Command>().unwrap(), Command::Convert);
        assert_eq!("convert".parse::<Command>().unwrap(), Command::Convert);
        assert_eq!(
            "amount  42.5 ".parse::<Command>().unwrap(),
            Command::Amount("42.5".to_string())
        );
        assert_eq!("from eur".parse::<Command>().unwrap(), Command::From(code("EUR")));
        assert_eq!("TO ghs".parse::<Command>().unwrap(), Command::To(code("GHS")));
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
        assert!("from".parse::<Command>().is_err());
        assert!("amount".parse::<Command>().is_err());
        assert!("jump".parse::<Command>().is_err());
        assert!("list all".parse::<Command>().is_err());
    }

    async fn mock_rates(server: &MockServer, base: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/key/latest/{base}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_scripted_session() {
        let server = MockServer::start().await;
        mock_rates(
            &server,
            "USD",
            r#"{"conversion_rates": {"USD": 1, "GHS": 12.5, "EUR": 0.8}, "flags": {"GHS": "GH"}}"#,
        )
        .await;
        mock_rates(&server, "EUR", r#"{"conversion_rates": {"EUR": 1, "GHS": 15}}"#).await;

        let provider = Arc::new(ExchangeRateApiProvider::new(&server.uri(), "key"));
        let mut screen = new_screen(provider, &AppConfig::default(), None, None, Some("10"));
        let input: &[u8] = b"convert\nfrom eur\n\nfrom XYZ\namount abc\nconvert\nlist\nquit\n";
        let mut out = Vec::new();

        run_with(&mut screen, input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("125.00"));
        assert!(text.contains("150.00"));
        assert!(text.contains("GH GHS"));
        assert!(text.contains("Unknown currency: XYZ"));
        assert_eq!(screen.state().base.as_str(), "EUR");
        assert_eq!(screen.state().result, None);
    }

    #[tokio::test]
    async fn test_session_survives_fetch_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = Arc::new(ExchangeRateApiProvider::new(&server.uri(), "key"));
        let mut screen = new_screen(provider, &AppConfig::default(), None, None, None);
        let input: &[u8] = b"convert\nfrom EUR\nrefresh\n";
        let mut out = Vec::new();

        run_with(&mut screen, input, &mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Error getting currency options"));
        assert!(text.contains("Error getting latest conversion rate"));
        assert!(screen.state().result.is_none());
        assert_eq!(screen.state().base.as_str(), "EUR");
    }
}
