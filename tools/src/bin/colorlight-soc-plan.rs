use std::fs::File;
use std::process;

use colorlight_soc::export::{check_csr_csv, write_csr_csv, write_json};
use colorlight_soc::{build_default, AssembledPlatform, Error};
use colorlight_tools::{app, options_from_matches};

fn run() -> Result<AssembledPlatform, Error> {
    let matches = app().get_matches();
    let options = options_from_matches(&matches)?;
    let platform = build_default(&options)?;

    if let Some(path) = matches.value_of("csr-csv") {
        write_csr_csv(&platform, File::create(path)?)?;
        log::info!("wrote CSR map to {}", path);
        if matches.is_present("check") {
            check_csr_csv(&platform, File::open(path)?)?;
            log::info!("{} matches the plan", path);
        }
    }
    if let Some(path) = matches.value_of("json") {
        write_json(&platform, File::create(path)?)?;
        log::info!("wrote platform description to {}", path);
    }
    Ok(platform)
}

fn main() {
    env_logger::init();
    let platform = match run() {
        Ok(platform) => platform,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    println!("{} on {}", platform.ident, platform.device);
    for domain in platform.domains.iter() {
        println!(
            "  {:<10} {:>12.0} Hz {:>5.0}°  ({:?} PLL)",
            domain.name, domain.frequency_hz, domain.phase_degrees, domain.pll
        );
    }
    for named in &platform.subsystems {
        println!("  {:<10} {} [{}]", named.name, named.subsystem.core, named.subsystem.domain);
    }
}
