use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{:#}", err).to_lowercase();

    if msg.contains("failed to open storage") || msg.contains("database") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Another slackbot may hold the database. Use a different path with:");
        eprintln!("  {} slackbot --db-path <file>", "$".dimmed());
        eprintln!("  or run without persistence:");
        eprintln!("  {} slackbot --storage memory", "$".dimmed());
    }

    if msg.contains("config") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check the config file or point to another one with:");
        eprintln!("  {} slackbot --config <file>", "$".dimmed());
    }

    std::process::exit(1);
}
