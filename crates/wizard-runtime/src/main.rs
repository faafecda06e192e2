//! `wizard-sim`: drives one scripted session and prints the final snapshot

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wizard_core::{
    AddOnConfig, IndustrySlug, SolarResource, UtilityRate, WeatherProfile, WizardStep,
};
use wizard_pricing::{ReferenceFinancialModel, ReferenceLoadModel};
use wizard_runtime::{
    CachedTemplateLoader, Collaborators, DirectoryTemplateLoader, FixedIntel,
    GenericTemplateLoader, InMemorySliceStore, SessionConfig, TemplateLoader, WizardSession,
    ZipOnlyResolver,
};

fn cli() -> Command {
    Command::new("wizard-sim")
        .version(wizard_runtime::VERSION)
        .about("Scripted wizard session against the reference pricing models")
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML session configuration"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Run one session from location to results")
                .arg(
                    Arg::new("zip")
                        .long("zip")
                        .default_value("94105")
                        .help("Location input"),
                )
                .arg(
                    Arg::new("industry")
                        .long("industry")
                        .default_value("hotel")
                        .help("Industry slug"),
                )
                .arg(
                    Arg::new("answer")
                        .long("answer")
                        .action(ArgAction::Append)
                        .help("Operator answer as key=value (value parsed as JSON when possible)"),
                )
                .arg(
                    Arg::new("solar-kw")
                        .long("solar-kw")
                        .value_parser(value_parser!(f64))
                        .help("Add a solar array on the options step"),
                )
                .arg(
                    Arg::new("rate")
                        .long("rate")
                        .default_value("0.18")
                        .value_parser(value_parser!(f64))
                        .help("Utility energy rate returned by enrichment ($/kWh)"),
                ),
        )
        .subcommand(Command::new("config").about("Print the effective configuration"))
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<SessionConfig> {
    let config = match path {
        Some(path) => SessionConfig::load(path)?,
        None => SessionConfig::default().with_env_overrides()?,
    };
    Ok(config)
}

fn parse_answer(raw: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("answer {raw:?} is not key=value"))?;
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.trim().to_string(), value))
}

async fn simulate(config: SessionConfig, args: &clap::ArgMatches) -> anyhow::Result<bool> {
    let zip = args.get_one::<String>("zip").map_or("94105", String::as_str);
    let industry = args.get_one::<String>("industry").map_or("hotel", String::as_str);
    let rate = args.get_one::<f64>("rate").copied();

    let templates: Arc<dyn TemplateLoader> = match &config.template_dir {
        Some(dir) => Arc::new(CachedTemplateLoader::new(
            Arc::new(DirectoryTemplateLoader::new(dir)),
            config.template_cache_capacity,
            config.template_cache_ttl(),
        )),
        None => Arc::new(GenericTemplateLoader),
    };
    let intel = FixedIntel {
        utility: UtilityRate {
            utility_name: Some("Reference Utility".to_string()),
            rate_per_kwh: rate,
            demand_charge_per_kw: Some(18.0),
        },
        solar: SolarResource {
            peak_sun_hours: Some(5.2),
            annual_ghi: None,
        },
        weather: WeatherProfile::default(),
    };
    let session = WizardSession::new(
        Collaborators::new(Arc::new(ZipOnlyResolver), Arc::new(intel), templates),
        Arc::new(ReferenceLoadModel),
        Arc::new(ReferenceFinancialModel::default()),
        Arc::new(InMemorySliceStore::new()),
        config,
    );

    session.submit_location(zip).await?;
    session
        .select_industry(IndustrySlug::new(industry), false)
        .await?;
    session.go_to_step(WizardStep::Profile).await?;
    if let Some(answers) = args.get_many::<String>("answer") {
        for raw in answers {
            let (key, value) = parse_answer(raw)?;
            session.set_answer(key, value);
        }
    }

    let completion = session.complete_profile().await?;
    completion.dispatched.wait_for_pricing().await;
    session.go_to_step(WizardStep::Options).await?;
    if let Some(kw) = args.get_one::<f64>("solar-kw") {
        session
            .confirm_add_ons(AddOnConfig::default().with_solar(*kw))
            .wait_for_pricing()
            .await;
    }
    session.go_to_step(WizardStep::Results).await?;

    let state = session.snapshot();
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(state.quote.is_some())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    let config = load_config(matches.get_one::<PathBuf>("config"))?;

    match matches.subcommand() {
        Some(("config", _)) => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Some(("simulate", args)) => {
            let quoted = simulate(config, args).await?;
            std::process::exit(if quoted { 0 } else { 1 });
        }
        _ => {
            cli().print_help()?;
        }
    }
    Ok(())
}
