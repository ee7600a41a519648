//! List the transition catalog.

use anitemp_common::config::AppConfig;
use anitemp_edit_model::Transition;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Transitions (default duration {:.1}s)", config.transitions.duration_secs);
    println!("{}", "=".repeat(50));
    for transition in Transition::ALL {
        println!("  {transition}");
    }
    println!();
    println!("Any other tag is accepted and leaves the segment unchanged.");
    Ok(())
}
