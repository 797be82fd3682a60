use std::env;
use std::fs::{File, create_dir_all};
use std::io::{self, BufWriter, Write, stdout};
use std::path::Path;

use rand::Rng;
use rand::RngExt;

const COUNTRIES: [(&str, f64); 6] = [
    ("Brazil", 0.30),
    ("Mexico", 0.25),
    ("Argentina", 0.15),
    ("Colombia", 0.15),
    ("Spain", 0.08),
    ("Germany", 0.07),
];

const PROCESSORS: [(&str, f64); 3] = [
    ("Processor A", 0.35),
    ("Processor B", 0.30),
    ("Processor C", 0.35),
];

const DECLINE_REASONS: [(&str, f64); 5] = [
    ("insufficient_funds", 0.30),
    ("fraud_suspicion", 0.25),
    ("technical_error", 0.20),
    ("3ds_failure", 0.15),
    ("expired_card", 0.10),
];

const NON_3DS_REASONS: [(&str, f64); 4] = [
    ("insufficient_funds", 0.36),
    ("fraud_suspicion", 0.30),
    ("technical_error", 0.22),
    ("expired_card", 0.12),
];

// Two anomalies are scripted into the data so the rule batteries have
// something to find: a one-day collapse of Processor B and a 3DS failure
// wave on European cards in the second half of the month.
const OUTAGE_PROCESSOR: &str = "Processor B";
const OUTAGE_DAY: u32 = 18;

struct GeneratorConfig {
    num_records: usize,
    output_path: String,
}

impl GeneratorConfig {
    fn from_args() -> Self {
        let args: Vec<String> = env::args().collect();
        let num_records = args.get(1).and_then(|s| s.parse().ok()).unwrap_or(6_000);
        let output_path = args
            .get(2)
            .cloned()
            .unwrap_or_else(|| "samples/generated_payments.csv".to_string());

        Self { num_records, output_path }
    }
}

fn main() -> io::Result<()> {
    let config = GeneratorConfig::from_args();

    println!(
        "Generating {} transactions in {}...",
        config.num_records, config.output_path
    );

    if let Some(parent) = Path::new(&config.output_path).parent() {
        create_dir_all(parent)?;
    }

    let file = File::create(&config.output_path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "id,timestamp,country,payment_method,processor,amount,approved,decline_reason")?;

    let mut rng = rand::rng();

    for record_id in 1..=config.num_records {
        let day = rng.random_range(1..=30u32);
        let country = pick(&mut rng, &COUNTRIES);
        let method = pick(&mut rng, methods_for(country));
        let processor = pick(&mut rng, &PROCESSORS);
        let amount = sample_amount(&mut rng);
        let approved = sample_approved(&mut rng, day, processor);
        let reason = if approved {
            ""
        } else {
            sample_decline_reason(&mut rng, day, country, method, processor)
        };

        writeln!(
            writer,
            "txn_{record_id:06},2023-11-{day:02}T{:02}:{:02}:{:02},{country},{method},{processor},{amount:.2},{approved},{reason}",
            rng.random_range(0..24u32),
            rng.random_range(0..60u32),
            rng.random_range(0..60u32),
        )?;

        if record_id % 1_000 == 0 {
            print!(".");
            stdout().flush()?;
        }
    }

    println!("\nGeneration complete.");

    Ok(())
}

fn methods_for(country: &str) -> &'static [(&'static str, f64)] {
    match country {
        "Brazil" => &[("PIX", 0.45), ("card_visa", 0.30), ("card_mastercard", 0.25)],
        "Mexico" => &[("OXXO", 0.40), ("card_visa", 0.32), ("card_mastercard", 0.28)],
        "Spain" => &[("SEPA", 0.40), ("card_visa", 0.32), ("card_mastercard", 0.28)],
        "Germany" => &[("SEPA", 0.50), ("card_visa", 0.27), ("card_mastercard", 0.23)],
        _ => &[("card_visa", 0.52), ("card_mastercard", 0.48)],
    }
}

fn pick<'a, R: Rng>(rng: &mut R, table: &[(&'a str, f64)]) -> &'a str {
    let roll: f64 = rng.random();
    let mut cumulative = 0.0;

    for (value, weight) in table {
        cumulative += weight;
        if roll < cumulative {
            return value;
        }
    }

    table[table.len() - 1].0
}

fn sample_amount<R: Rng>(rng: &mut R) -> f64 {
    // Cubing the uniform roll skews volume toward small tickets while still
    // producing a usable above-$400 tail.
    let roll: f64 = rng.random();
    10.0 + 790.0 * roll.powi(3)
}

fn sample_approved<R: Rng>(rng: &mut R, day: u32, processor: &str) -> bool {
    if processor == OUTAGE_PROCESSOR && day == OUTAGE_DAY {
        return rng.random_bool(0.10);
    }

    rng.random_bool(if day <= 15 { 0.82 } else { 0.70 })
}

fn sample_decline_reason<R: Rng>(
    rng: &mut R,
    day: u32,
    country: &str,
    method: &str,
    processor: &str,
) -> &'static str {
    if processor == OUTAGE_PROCESSOR && day == OUTAGE_DAY && rng.random_bool(0.80) {
        return "technical_error";
    }

    let is_european_card = matches!(country, "Spain" | "Germany")
        && matches!(method, "card_visa" | "card_mastercard");
    if day > 15 && is_european_card {
        if rng.random_bool(0.63) {
            return "3ds_failure";
        }
        return pick(rng, &NON_3DS_REASONS);
    }

    pick(rng, &DECLINE_REASONS)
}
