use std::{env, fs, process::ExitCode, time::Instant};

use foppl::{CompileOptions, compile, registry::DistributionRegistry};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    let file_path = if args.len() > 1 { &args[1] } else { "example.foppl" };
    let source = match read_file(file_path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let registry = DistributionRegistry::new();
    let start = Instant::now();
    let model = match compile(&source, &CompileOptions::new(), &registry) {
        Ok(model) => model,
        Err(err) => {
            let elapsed = start.elapsed();
            eprintln!("compile failed after {elapsed:?}\n{}", err.render(&source));
            return ExitCode::FAILURE;
        }
    };
    let elapsed = start.elapsed();
    eprintln!("compiled {file_path} in {elapsed:?}");

    println!("{}", model.pretty_print());
    println!("\n--- sample_code ---\n{}", model.sample_code());
    println!("\n--- logpdf_code ---\n{}", model.logpdf_code());

    ExitCode::SUCCESS
}

fn read_file(file_path: &str) -> Result<String, String> {
    eprintln!("Reading file: {file_path}");
    match fs::metadata(file_path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("Error: {file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("Error reading {file_path}: {err}"));
        }
    }
    match fs::read_to_string(file_path) {
        Ok(contents) => Ok(contents),
        Err(err) => Err(format!("Error reading file: {err}")),
    }
}
