//! Phone Pilot - AI-powered Android phone automation
//!
//! This is the CLI entry point for the phone-pilot tool.
//! Run with: cargo run --bin phone-pilot -- "打开设置"
//!
//! Flags:
//!   --profile NAME    use a model profile from the profiles file
//!   --save-settings   write the effective settings to the config dir and exit

use std::env;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

use phone_pilot::adb::{ADBConnection, AdbDevice};
use phone_pilot::billing::{load_pricing_config, CostLedger, TaskBillingSummary};
use phone_pilot::config::{get_messages, load_profiles};
use phone_pilot::model::{describe_error, ModelClient};
use phone_pilot::{
    AgentError, AgentOutcome, AppSettings, OpenAiClient, OperatorChoice, PhoneAgent, ProgressPhase,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = CliArgs::parse(env::args().skip(1));
    let mut settings = AppSettings::load().apply_env();
    if let Some(profile) = &args.profile {
        settings.profile = profile.clone();
    }
    let lang = settings.lang.clone();

    if args.save_settings {
        settings.save()?;
        if let Some(path) = AppSettings::settings_path() {
            println!("Settings saved to {}", path.display());
        }
        return Ok(());
    }

    let device_id = match settings.device_id() {
        Some(id) => id.to_string(),
        None => ADBConnection::new().first_ready_device()?.device_id,
    };
    let device = Arc::new(AdbDevice::new(&device_id));

    let mut ledger = match settings.pricing_path() {
        Some(path) => load_pricing_config(path)?,
        None => CostLedger::with_default_pricing(),
    };

    let mut model_config = settings.to_model_config();
    let profiles = match settings.profiles_path() {
        Some(path) => Some(load_profiles(path)?),
        None => None,
    };
    let profile = match &profiles {
        Some(set) => set.select(settings.profile_name())?,
        None if settings.profile_name().is_some() => {
            anyhow::bail!("Profile {} requested but no profiles file found", settings.profile)
        }
        None => None,
    };
    if let Some(profile) = profile {
        tracing::info!("Using profile {} ({})", profile.name, profile);
        model_config = profile.apply_to(model_config)?;
        if let Some(pricing) = profile.pricing_override() {
            ledger.register_pricing(pricing);
        }
    }

    let model = Arc::new(OpenAiClient::new(model_config.clone()));
    let vendor = model.provider_name().to_string();

    println!("🤖 Phone Pilot - AI-powered Android Automation");
    println!("================================================");
    println!(
        "Model: {} @ {} ({})",
        model_config.model_name, model_config.base_url, vendor
    );
    println!("Language: {}", lang);
    println!("Device: {}", device_id);
    println!(
        "Retry: max {} attempts, {}s delay",
        model_config.max_retries, model_config.retry_delay_secs
    );
    println!("================================================\n");

    let msgs = get_messages(&lang);
    let mut agent = PhoneAgent::new(settings.to_agent_config(), device, model)
        .with_billing(ledger, vendor, &model_config.model_name)
        .on_progress(move |update| match update.phase {
            ProgressPhase::Thinking => println!("\n── {} {} ──", msgs.step, update.step),
            ProgressPhase::Action => {
                if let Some(thinking) = update.thinking.as_deref().filter(|t| !t.is_empty()) {
                    println!("💭 {}: {}", msgs.thinking, thinking);
                }
                if let Some(action) = &update.action {
                    println!("🎯 {}: {}", msgs.action, action);
                }
            }
            ProgressPhase::Waiting => {}
        })
        .on_step(move |result| {
            let mark = if result.success { "✅" } else { "❌" };
            println!(
                "{} {}: {}",
                mark,
                msgs.result,
                result.message.as_deref().unwrap_or_default()
            );
            if result.step_cost > 0.0 {
                println!("💰 {}: {:.6}", msgs.cost, result.step_cost);
            }
        });

    let control = agent.control();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling after the current step");
            control.cancel();
        }
    });

    if !args.task.is_empty() {
        let task = args.task.join(" ");
        run_task(&mut agent, &task, &lang).await?;
        return Ok(());
    }

    // Interactive mode
    println!("Interactive mode. Type your task and press Enter.");
    println!("Type 'quit' or 'exit' to exit.\n");
    loop {
        print!("📝 Task: ");
        io::stdout().flush()?;
        let line = read_line()?;
        if line.is_empty() {
            // EOF
            break;
        }
        let task = line.trim();

        if task.is_empty() {
            continue;
        }
        if task == "quit" || task == "exit" {
            println!("Goodbye! 👋");
            break;
        }
        run_task(&mut agent, task, &lang).await?;
    }

    Ok(())
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    profile: Option<String>,
    save_settings: bool,
    task: Vec<String>,
}

impl CliArgs {
    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut parsed = CliArgs::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--profile" => parsed.profile = args.next(),
                "--save-settings" => parsed.save_settings = true,
                _ => parsed.task.push(arg),
            }
        }
        parsed
    }
}

/// Run one task to completion, prompting the operator whenever it suspends.
async fn run_task(agent: &mut PhoneAgent, task: &str, lang: &str) -> anyhow::Result<()> {
    let msgs = get_messages(lang);
    println!("📝 {}: {}\n", msgs.starting_task, task);

    let mut result = agent.run(task).await;
    while matches!(result, Ok(AgentOutcome::AwaitingOperator { .. })) {
        let choice = ask_operator(lang)?;
        result = agent.resume_operator(choice).await;
    }

    match result {
        Ok(outcome) => println!("\n🏁 {}: {}", msgs.result, outcome.message(lang)),
        Err(AgentError::Model(e)) => eprintln!("\n❌ {}", describe_error(&e)),
        Err(e) => eprintln!("\n❌ {}", e),
    }
    if let Some(summary) = agent.billing_summary() {
        print_billing(&summary, lang);
    }
    Ok(())
}

fn ask_operator(lang: &str) -> io::Result<OperatorChoice> {
    let msgs = get_messages(lang);
    loop {
        print!("👤 {} ", msgs.operator_prompt);
        io::stdout().flush()?;
        match read_line()?.trim().to_lowercase().as_str() {
            "" | "c" => return Ok(OperatorChoice::Continue),
            "s" => return Ok(OperatorChoice::Stop),
            "m" => {
                println!("{}", msgs.manual_operation_hint);
                print!("{} ", msgs.press_enter_when_done);
                io::stdout().flush()?;
                read_line()?;
                return Ok(OperatorChoice::ManualThenContinue);
            }
            _ => continue,
        }
    }
}

fn read_line() -> io::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn print_billing(summary: &TaskBillingSummary, lang: &str) {
    if summary.step_count == 0 {
        return;
    }
    let msgs = get_messages(lang);
    println!("================================================");
    println!("💰 {} ({} / {})", msgs.cost, summary.provider, summary.model);
    println!(
        "   Tokens: {} prompt + {} completion over {} calls",
        summary.total_prompt_tokens, summary.total_completion_tokens, summary.step_count
    );
    println!(
        "   Input {:.6} + Output {:.6} = {:.6} {}",
        summary.total_input_cost, summary.total_output_cost, summary.total_cost, summary.currency
    );
    println!("================================================\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_task_words_joined_around_flags() {
        let args = parse(&["--profile", "deepseek", "打开", "设置"]);
        assert_eq!(args.profile.as_deref(), Some("deepseek"));
        assert!(!args.save_settings);
        assert_eq!(args.task, vec!["打开", "设置"]);
    }

    #[test]
    fn test_save_settings_flag() {
        let args = parse(&["--save-settings"]);
        assert!(args.save_settings);
        assert!(args.task.is_empty());
        assert_eq!(parse(&[]), CliArgs::default());
    }
}
