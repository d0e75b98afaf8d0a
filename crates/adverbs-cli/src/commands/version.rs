// SPDX-License-Identifier: Apache-2.0
//! Version command implementation.

use std::path::Path;

use console::style;

use super::common;

/// Execute the version command.
pub fn execute(library: Option<&Path>, config_file: Option<&Path>) {
    let version = env!("CARGO_PKG_VERSION");

    println!(
        "{} {} - RDMA device discovery and capability queries",
        style("adverbs").cyan().bold(),
        style(format!("v{version}")).yellow()
    );
    println!();
    match common::resolve_config(library, config_file) {
        Ok(config) => println!("Verbs library: {}", config.library_path.display()),
        Err(e) => println!("Verbs library: {} ({e:#})", style("unresolved").red()),
    }
    println!();
    println!("Components:");
    println!("  adverbs      Device enumeration, contexts and attribute queries");
    println!("  adverbs-cli  Command-line interface");
    println!();
    println!(
        "Repository: {}",
        style("https://github.com/adverbs-rs/adverbs").underlined()
    );
    println!("License:    {}", style("Apache-2.0").dim());
}
