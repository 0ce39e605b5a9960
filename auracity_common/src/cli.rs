use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to config.toml
    #[arg(short, long, value_hint = clap::ValueHint::FilePath, env, default_value(".config/config.toml"))]
    pub config: String,
    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialOrd, PartialEq)]
pub enum Commands {
    /// Performs health checks and prints the result as json.
    Healthcheck,
    /// Writes a database backup and exits.
    Backup,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let args = Args::parse_from(["auracity_bot", "--config", "bot.toml", "backup"]);

        assert_eq!(args.config, "bot.toml");
        assert_eq!(args.command, Some(Commands::Backup));
    }

    #[test]
    fn command_is_optional() {
        let args = Args::parse_from(["auracity_bot"]);

        assert_eq!(args.command, None);
    }
}
