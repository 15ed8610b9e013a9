//! runs every behaviour scenario against each ledger preset

use anyhow::{bail, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tally_sim::scenarios::Scenario;
use tally_sim::SimulationPresets;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    println!("{}", "Tally Ledger Simulation".bright_blue().bold());
    println!("{}", "=======================".bright_blue());

    let presets = vec![
        ("Local", SimulationPresets::local()),
        ("Constrained", SimulationPresets::constrained()),
    ];

    let mut failures = 0;
    for (name, config) in presets {
        println!("{}", format!("\n>>> Preset: {name}").bright_green().bold());
        println!("Max transfer lines: {}", config.max_transfer_lines);
        println!("Max message size: {} bytes", config.max_message_size);
        println!("Notification buffer: {}", config.notification_buffer);
        println!();

        let bar = ProgressBar::new(Scenario::ALL.len() as u64);
        bar.set_style(ProgressStyle::with_template("{bar:30.cyan/blue} {pos}/{len} {msg}")?);
        for scenario in Scenario::ALL {
            bar.set_message(scenario.name());
            match scenario.run(config.clone()).await {
                Ok(()) => bar.println(format!("{} {}", "✓".green(), scenario.name())),
                Err(e) => {
                    failures += 1;
                    bar.println(format!("{} {}: {e:#}", "✗".red(), scenario.name()));
                }
            }
            bar.inc(1);
        }
        bar.finish_with_message("done");
    }

    if failures > 0 {
        bail!("{failures} scenario runs failed");
    }
    println!("\n{}", "All scenarios passed!".bright_green().bold());
    Ok(())
}
