use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "coversaver",
    author,
    version,
    about = "Album cover screen saver builder"
)]
pub struct Cli {
    /// Configuration file (defaults to `<config dir>/coversaver.toml`).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Authorize access to a music library.
    Auth(AuthCommand),
    /// Fetch saved albums and write the merged cover list.
    Collect(CollectArgs),
    /// Download covers and package the installable screen saver zip.
    Bundle(BundleArgs),
    /// Lay out the cover grid for a viewport and describe it.
    Layout(LayoutArgs),
    /// Print resolved config and data directories.
    Where,
}

#[derive(Parser, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub service: AuthService,
}

#[derive(Subcommand, Debug)]
pub enum AuthService {
    /// Spotify PKCE flow: prints the authorize url, then exchanges `--code`.
    Spotify(SpotifyAuthArgs),
}

#[derive(Args, Debug)]
pub struct SpotifyAuthArgs {
    /// Authorization code from the redirect after approving access.
    #[arg(long, value_name = "CODE")]
    pub code: Option<String>,

    /// Spotify application client id; also read from `SPOTIFY_CLIENT_ID`.
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Redirect uri registered with the Spotify application.
    #[arg(long, value_name = "URI")]
    pub redirect_uri: Option<String>,
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// Include the Spotify library (requires `auth spotify`).
    #[arg(long)]
    pub spotify: bool,

    /// Include the Apple Music library.
    #[arg(long)]
    pub apple: bool,

    /// Where to write the merged cover list (defaults to `<data dir>/covers.json`).
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Apple Music developer token; also read from `APPLE_DEVELOPER_TOKEN`.
    #[arg(long, env = "APPLE_DEVELOPER_TOKEN", hide_env_values = true)]
    pub apple_developer_token: Option<String>,

    /// MusicKit team id used to sign developer tokens.
    #[arg(long, env = "APPLE_TEAM_ID")]
    pub apple_team_id: Option<String>,

    /// MusicKit key id used to sign developer tokens.
    #[arg(long, env = "APPLE_KEY_ID")]
    pub apple_key_id: Option<String>,

    /// MusicKit private key (`AuthKey_<id>.p8`).
    #[arg(long, env = "APPLE_PRIVATE_KEY_PATH", value_name = "FILE")]
    pub apple_private_key: Option<PathBuf>,

    /// Apple Music user token; also read from `APPLE_MUSIC_USER_TOKEN`.
    #[arg(long, env = "APPLE_MUSIC_USER_TOKEN", hide_env_values = true)]
    pub apple_music_user_token: Option<String>,
}

impl CollectArgs {
    /// With neither service flag, every service is collected.
    pub fn services(&self) -> (bool, bool) {
        if !self.spotify && !self.apple {
            (true, true)
        } else {
            (self.spotify, self.apple)
        }
    }
}

#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Cover list written by `collect` (defaults to `<data dir>/covers.json`).
    #[arg(long, value_name = "FILE")]
    pub covers: Option<PathBuf>,

    /// Directory holding the compiled saver binary and `Info.plist`.
    #[arg(long, value_name = "DIR")]
    pub template: PathBuf,

    /// Output zip path (defaults to `<name>.zip`).
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct LayoutArgs {
    #[arg(long, value_name = "POINTS")]
    pub width: f64,

    #[arg(long, value_name = "POINTS")]
    pub height: f64,

    /// Covers directory, or a `.saver` bundle containing one.
    #[arg(long, value_name = "DIR")]
    pub covers: PathBuf,

    /// Seed for the shuffle and entrance delays.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print the full layout as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_defaults_to_every_service() {
        let cli = Cli::try_parse_from(["coversaver", "collect"]).unwrap();
        let Command::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.services(), (true, true));
        assert_eq!(args.output, None);

        let cli = Cli::try_parse_from(["coversaver", "collect", "--spotify"]).unwrap();
        let Command::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.services(), (true, false));
    }

    #[test]
    fn collect_accepts_apple_signing_key() {
        let cli = Cli::try_parse_from([
            "coversaver",
            "collect",
            "--apple",
            "--apple-team-id",
            "TEAM123456",
            "--apple-key-id",
            "KEY1234567",
            "--apple-private-key",
            "AuthKey_KEY1234567.p8",
        ])
        .unwrap();
        let Command::Collect(args) = cli.command else {
            panic!("expected collect");
        };
        assert_eq!(args.apple_team_id.as_deref(), Some("TEAM123456"));
        assert_eq!(args.apple_key_id.as_deref(), Some("KEY1234567"));
        assert_eq!(
            args.apple_private_key,
            Some(PathBuf::from("AuthKey_KEY1234567.p8"))
        );
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "coversaver",
            "layout",
            "--width",
            "1024",
            "--height",
            "800",
            "--covers",
            "covers",
            "--config",
            "custom.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        let Command::Layout(args) = cli.command else {
            panic!("expected layout");
        };
        assert_eq!(args.width, 1024.0);
        assert!(!args.json);
    }

    #[test]
    fn bundle_requires_template() {
        assert!(Cli::try_parse_from(["coversaver", "bundle"]).is_err());
    }
}
