use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use clap::Args;
use heat_intake::config::AppConfig;
use heat_intake::error::AppError;
use heat_intake::intake::{
    AnswerPatch, BoilerAge, ContactMethod, ContactTime, DraftStore, EpcRating, GasSupply,
    HeatingType, HttpRelay, IntakeWizard, PropertyRelationship, PropertyType, Provenance,
    RelayAck, RelayError, RelayRequest, RelayTransport, Step, SubmissionError,
    SubmissionPipeline, WizardEvent,
};

const DEMO_USER_AGENT: &str = "heat-intake-demo";
const DRY_RUN_KEY: &str = "dry-run";

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Fill the hidden honeypot field to show the spam guard blocking the submission
    #[arg(long)]
    pub(crate) honeypot: Option<String>,
    /// Print the relay payload instead of posting it
    #[arg(long)]
    pub(crate) dry_run: bool,
}

/// Prints the payload and acknowledges it without leaving the process.
struct PrintingRelay;

#[async_trait]
impl RelayTransport for PrintingRelay {
    async fn send(&self, request: &RelayRequest) -> Result<RelayAck, RelayError> {
        println!("\nRelay payload (dry run)");
        println!("  Subject: {}", request.subject);
        println!("  From: {}", request.from_name);
        if let Some(reply_to) = &request.reply_to {
            println!("  Reply-To: {reply_to}");
        }
        println!("{}", request.message);
        Ok(RelayAck {
            success: true,
            message: Some("dry run".to_string()),
        })
    }
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { honeypot, dry_run } = args;

    let (transport, access_key): (Arc<dyn RelayTransport>, Option<String>) = if dry_run {
        (Arc::new(PrintingRelay), Some(DRY_RUN_KEY.to_string()))
    } else {
        let config = AppConfig::load()?;
        (
            Arc::new(HttpRelay::new(&config.relay)?),
            config.relay.access_key.clone(),
        )
    };

    println!("Heating grant intake demo");
    let mut wizard = IntakeWizard::new(
        DraftStore::in_memory(),
        Provenance::from_query([("utm_source", "cli"), ("utm_medium", "demo")]),
    );
    wizard.subscribe(|event: &WizardEvent| {
        if let WizardEvent::Notice(notice) = event {
            println!("  [{}] {}", notice.title, notice.description);
        }
    });

    for (step, patch) in sample_patches() {
        wizard.update(patch);
        match wizard.advance() {
            Ok(next) => println!("Step {step} ({}) complete -> step {next}", step.title()),
            Err(rejected) => {
                println!("Step {step} blocked: {rejected}");
                return Ok(());
            }
        }
    }

    let review = wizard.review();
    println!("\nReview");
    for section in &review.sections {
        println!("  {}", section.title);
        for row in &section.rows {
            println!("    {:<18} {}", row.label, row.value);
        }
    }
    println!("\nEligibility hints: {}", review.eligibility);

    if let Some(value) = honeypot {
        wizard.set_honeypot(value);
    }

    let wizard = Mutex::new(wizard);
    let pipeline = SubmissionPipeline::new(transport, access_key);
    match pipeline.submit(&wizard, DEMO_USER_AGENT).await {
        Ok(receipt) => {
            println!(
                "\nSubmitted at {}",
                receipt.submitted_at.format("%d/%m/%Y %H:%M:%S")
            );
            if let Some(message) = receipt.relay_message {
                println!("Relay said: {message}");
            }
            Ok(())
        }
        Err(SubmissionError::Relay(err)) => Err(err.into()),
        Err(other) => {
            println!("\nSubmission not sent: {other}");
            Ok(())
        }
    }
}

fn sample_patches() -> Vec<(Step, AnswerPatch)> {
    let mut benefits = BTreeSet::new();
    benefits.insert("Universal Credit".to_string());

    vec![
        (
            Step::HOUSEHOLD,
            AnswerPatch {
                property_relationship: Some(Some(PropertyRelationship::Homeowner)),
                benefits: Some(benefits),
                adults: Some("2".to_string()),
                children: Some("1".to_string()),
                ..AnswerPatch::default()
            },
        ),
        (
            Step::PROPERTY,
            AnswerPatch {
                postcode: Some("ls1 4ap".to_string()),
                address: Some("22 Park Row, Leeds".to_string()),
                has_gas: Some(Some(GasSupply::No)),
                current_heating: Some(Some(HeatingType::ElectricStorage)),
                boiler_age: Some(Some(BoilerAge::ThirteenPlus)),
                epc_rating: Some(EpcRating::E),
                property_type: Some(Some(PropertyType::House)),
                ..AnswerPatch::default()
            },
        ),
        (
            Step::CONTACT,
            AnswerPatch {
                first_name: Some("Sam".to_string()),
                last_name: Some("Taylor".to_string()),
                email: Some("sam.taylor@example.com".to_string()),
                phone: Some("07700 900456".to_string()),
                preferred_contact: Some(Some(ContactMethod::Phone)),
                contact_time: Some(Some(ContactTime::Evening)),
                consent_contact: Some(true),
                consent_privacy: Some(true),
                notes: Some("Storage heaters are original to the house.".to_string()),
                ..AnswerPatch::default()
            },
        ),
    ]
}
