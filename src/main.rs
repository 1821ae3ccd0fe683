//! rampart CLI tool.

use clap::{Parser, Subcommand};
use rampart::actions::{Action, DataAction, DisruptiveAction, FlowAction, MetadataAction, SetVar};
use rampart::transformations::{create_transformation, TransformationPipeline, TransformationResults};
use rampart::variables::Collection;
use rampart::{
    Engine, Error, Matcher, Result, Rule, RuleEngineMode, RuleSet, RuntimeString, Transaction,
};
use regex::Regex;
use tracing::info;

#[derive(Parser)]
#[command(name = "rampart")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a payload against the built-in demo rules
    Eval {
        /// Payload to inspect
        #[arg(short, long)]
        payload: String,

        /// Detect without blocking
        #[arg(short, long)]
        detection_only: bool,

        /// Status code for deny actions that do not name one
        #[arg(short, long, default_value_t = 403)]
        status: u16,
    },

    /// Apply a transformation sequence to a value
    Transform {
        /// Input value
        #[arg(short = 'V', long)]
        value: String,

        /// Transformation names, applied in order
        #[arg(short, long)]
        transformation: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Eval {
            payload,
            detection_only,
            status,
        } => eval_payload(&payload, detection_only, status),
        Commands::Transform {
            value,
            transformation,
        } => transform_value(&value, &transformation),
    }
}

/// Feeds one CLI payload to every rule as `ARGS:payload`.
struct PayloadMatcher {
    payload: String,
    pattern: Regex,
}

impl Matcher for PayloadMatcher {
    fn candidates(&self, _tx: &Transaction) -> Vec<(String, String)> {
        vec![("ARGS:payload".to_string(), self.payload.clone())]
    }

    fn matches(&self, tx: &mut Transaction, value: &str) -> bool {
        match self.pattern.captures(value) {
            Some(caps) => {
                let captured = caps
                    .iter()
                    .flatten()
                    .map(|group| group.as_str().to_string())
                    .collect();
                tx.set_captures(captured);
                true
            }
            None => false,
        }
    }
}

fn pattern(re: &str) -> Result<Regex> {
    Regex::new(re).map_err(|source| Error::RegexCompile {
        pattern: re.to_string(),
        source,
    })
}

fn rts(s: &str) -> Result<RuntimeString> {
    RuntimeString::parse(s)
}

/// A handful of CRS-flavored rules wired to the payload matcher.
fn demo_ruleset(payload: &str, mode: RuleEngineMode) -> Result<RuleSet> {
    let mut rules = RuleSet::new();
    rules.set_mode(mode);
    rules.set_default_actions(vec![
        Action::Metadata(MetadataAction::Phase(2)),
        Action::Metadata(MetadataAction::Tag(rts("demo-rules")?)),
    ])?;

    let matcher = |re: &str| -> Result<std::sync::Arc<dyn Matcher>> {
        Ok(std::sync::Arc::new(PayloadMatcher {
            payload: payload.to_string(),
            pattern: pattern(re)?,
        }))
    };

    let mut decode = TransformationPipeline::new();
    decode.add(create_transformation("urlDecode")?);
    decode.add(create_transformation("lowercase")?);

    let mut sqli = Rule::new(
        vec![
            Action::Metadata(MetadataAction::Id(942100)),
            Action::Metadata(MetadataAction::Phase(2)),
            Action::Metadata(MetadataAction::Severity(2)),
            Action::Metadata(MetadataAction::Msg(rts("SQL injection attempt")?)),
            Action::Metadata(MetadataAction::LogData(rts("matched: %{matched_var}")?)),
            Action::Metadata(MetadataAction::Tag(rts("attack-sqli")?)),
            Action::Data(DataAction::Capture),
            Action::Data(DataAction::SetVar(SetVar::increment(
                rts("sqli_score")?,
                None,
            ))),
            Action::Disruptive(DisruptiveAction::deny()),
        ],
        Some(decode.clone()),
        Some("demo.conf".to_string()),
        10,
    )?;
    sqli.set_matcher(matcher(r"(?:union\s+select|or\s+1=1|'\s*--)")?);
    rules.add_rule(sqli)?;

    let mut xss = Rule::new(
        vec![
            Action::Metadata(MetadataAction::Id(941100)),
            Action::Metadata(MetadataAction::Phase(2)),
            Action::Metadata(MetadataAction::Severity(2)),
            Action::Metadata(MetadataAction::Msg(rts("XSS attempt")?)),
            Action::Metadata(MetadataAction::Tag(rts("attack-xss")?)),
            Action::Disruptive(DisruptiveAction::deny()),
        ],
        Some(decode),
        Some("demo.conf".to_string()),
        20,
    )?;
    xss.set_matcher(matcher(r"(?:<script|javascript:)")?);
    rules.add_rule(xss)?;

    // Chained rule: only fires when both conditions hold.
    let mut probe = Rule::new(
        vec![
            Action::Metadata(MetadataAction::Id(949110)),
            Action::Metadata(MetadataAction::Phase(2)),
            Action::Metadata(MetadataAction::Msg(rts("admin probe with quote")?)),
            Action::Flow(FlowAction::Chain),
            Action::Disruptive(DisruptiveAction::deny()),
        ],
        None,
        Some("demo.conf".to_string()),
        30,
    )?;
    probe.set_matcher(matcher("admin")?);
    rules.add_rule(probe)?;

    let mut quote = Rule::new(vec![Action::Metadata(MetadataAction::Phase(2))], None, None, 31)?;
    quote.set_matcher(matcher("'")?);
    rules.add_rule(quote)?;

    Ok(rules)
}

fn eval_payload(payload: &str, detection_only: bool, status: u16) -> Result<()> {
    let mode = if detection_only {
        RuleEngineMode::DetectionOnly
    } else {
        RuleEngineMode::On
    };

    info!("Evaluating payload against demo rules");
    let mut engine = Engine::new(demo_ruleset(payload, mode)?)?;
    engine.set_default_status(status);

    let mut tx = engine.new_transaction();
    engine.evaluate(&mut tx);

    match tx.intervention() {
        Some(intervention) => {
            println!("BLOCKED");
            println!("  Status: {}", intervention.status);
            println!("  Phase: {}", intervention.phase.name());
            if let Some(rule_id) = intervention.rule_id {
                println!("  Rule: {}", rule_id);
            }
            if let Some(ref log) = intervention.log {
                println!("  Message: {}", log);
            }
        }
        None => println!("ALLOWED"),
    }

    if !tx.messages().is_empty() {
        println!("\nMatches:");
        for message in tx.messages() {
            println!("  {}", message.log());
        }
    }
    if let Some(score) = tx.tx().first("sqli_score") {
        println!("\nSQLi score: {}", score);
    }
    if tx.is_marked_for_audit() {
        println!("Audit log parts: {}", tx.audit_parts().letters());
    }

    Ok(())
}

fn transform_value(value: &str, names: &[String]) -> Result<()> {
    let pipeline = TransformationPipeline::from_names(names)?;

    let mut results = TransformationResults::new();
    for transformation in pipeline.transformations() {
        Rule::execute_transformation_chained(transformation.as_ref(), value, &mut results);
    }

    println!("input: {:?}", value);
    for result in &results {
        let note = if result.success { "" } else { " (failed)" };
        println!("  t:{} -> {:?}{}", result.name, result.value, note);
    }
    println!(
        "final: {:?}",
        results.last().map_or(value, |r| r.value.as_str())
    );

    Ok(())
}
