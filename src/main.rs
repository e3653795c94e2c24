use rowmpmc::{sweep, RunConfig, RunSummary, SeqMessage};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();
    let config = match parse_args(&args) {
        Ok(config) => config,
        Err(message) => {
            println!("{message}");
            println!("Usage: rowmpmc <num producers> <num consumers>");
            process::exit(1);
        }
    };

    println!(
        "{:>9}  {:>18}   ({} producer(s), {} consumer(s), {} elements, {:?} per shape)",
        "row width",
        "100*usec/msg",
        config.num_producers,
        config.num_consumers,
        config.capacity,
        config.window,
    );

    let result = sweep::<SeqMessage, _>(&config, |summary: &RunSummary| {
        println!(
            "{:>9}  {:>18.3}",
            summary.columns,
            summary.scaled_micros_per_message()
        );
    });

    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn parse_args(args: &[String]) -> Result<RunConfig, String> {
    match args {
        [_] => {
            println!("Usage: rowmpmc <num producers> <num consumers>");
            println!("No arguments given, using defaults: 2 producer(s), 2 consumer(s)");
            Ok(RunConfig::default())
        }
        [_, producers, consumers] => {
            let num_producers = producers
                .parse()
                .map_err(|_| format!("invalid producer count: {producers}"))?;
            let num_consumers = consumers
                .parse()
                .map_err(|_| format!("invalid consumer count: {consumers}"))?;
            Ok(RunConfig::new(num_producers, num_consumers))
        }
        _ => Err("expected exactly two arguments".to_string()),
    }
}
