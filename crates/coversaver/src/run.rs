use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use collage::{
    DirectorySource, GridParams, GridView, ImageSource, RandomSource, ScheduleLog, SeededRandom,
    Viewport,
};
use covers::{
    assemble_bundle, code_challenge, generate_verifier, http_fetcher, merge_covers, unix_now,
    AccessToken, AppleMusicClient, AssemblyPhase, BundleOptions, Cover, DeveloperKey,
    SaverTemplate, SpotifyClient,
};
use reqwest::blocking::Client;
use saverconfig::{AppleSection, SaverConfig};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{BundleArgs, CollectArgs, LayoutArgs, SpotifyAuthArgs};
use crate::paths::AppPaths;
use crate::state::AppState;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("coversaver/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")
}

pub fn run_auth_spotify(
    args: SpotifyAuthArgs,
    config: &SaverConfig,
    paths: &AppPaths,
    state: &mut AppState,
) -> Result<()> {
    let client_id = args
        .client_id
        .or_else(|| config.spotify.client_id.clone())
        .ok_or_else(|| {
            anyhow!("Spotify client id required (--client-id, SPOTIFY_CLIENT_ID, or [spotify].client_id)")
        })?;
    let redirect_uri = args
        .redirect_uri
        .unwrap_or_else(|| config.spotify.redirect_uri.clone());
    let client = SpotifyClient::new(http_client()?, client_id, redirect_uri);

    match args.code {
        None => {
            let verifier = generate_verifier(&mut rand::thread_rng());
            let url = client.authorize_url(&code_challenge(&verifier))?;
            state.spotify_verifier = Some(verifier);
            state.persist(&paths.state_file())?;
            println!("Open this url, approve access, then rerun with --code <CODE>:");
            println!("  {url}");
        }
        Some(code) => {
            let verifier = state.spotify_verifier.clone().ok_or_else(|| {
                anyhow!("no pending Spotify authorization; run `coversaver auth spotify` first")
            })?;
            let token = client.exchange_code(&code, &verifier)?;
            state.spotify_verifier = None;
            state.spotify_token = Some(token);
            state.persist(&paths.state_file())?;
            println!("Spotify authorized.");
        }
    }
    Ok(())
}

pub fn run_collect(
    args: CollectArgs,
    config: &SaverConfig,
    paths: &AppPaths,
    state: &mut AppState,
) -> Result<()> {
    let (want_spotify, want_apple) = args.services();
    let explicit = args.spotify || args.apple;
    let http = http_client()?;

    let mut spotify = Vec::new();
    if want_spotify {
        match state.usable_spotify_token() {
            Some(token) => {
                let client_id = config.spotify.client_id.clone().unwrap_or_default();
                let client =
                    SpotifyClient::new(http.clone(), client_id, config.spotify.redirect_uri.clone());
                spotify = client.fetch_album_covers(token)?;
            }
            None if explicit => {
                bail!("no usable Spotify token; run `coversaver auth spotify` first")
            }
            None => warn!("skipping Spotify: not authorized"),
        }
    }

    let mut apple = Vec::new();
    if want_apple {
        let developer_token = resolve_developer_token(
            &args,
            &config.apple,
            &mut state.apple_developer_token,
            unix_now(),
        )?;
        let user_token = args
            .apple_music_user_token
            .clone()
            .or_else(|| config.apple.music_user_token.clone());
        match (developer_token, user_token) {
            (Some(developer), Some(user)) => {
                let client =
                    AppleMusicClient::new(http, developer, user, config.bundle.artwork_size)?;
                apple = client.fetch_album_covers()?;
            }
            _ if explicit => bail!(
                "Apple Music needs a developer token (or signing key) and a music user token \
                 (APPLE_DEVELOPER_TOKEN / APPLE_MUSIC_USER_TOKEN or [apple] config)"
            ),
            _ => warn!("skipping Apple Music: tokens not configured"),
        }
    }

    let (apple_count, spotify_count) = (apple.len(), spotify.len());
    let merged = merge_covers(apple, spotify);
    let output = args.output.unwrap_or_else(|| paths.covers_file());
    write_covers(&output, &merged)?;
    info!(
        apple = apple_count,
        spotify = spotify_count,
        merged = merged.len(),
        path = %output.display(),
        "wrote cover list"
    );
    println!(
        "Collected {} covers ({} Apple Music, {} Spotify) into {}",
        merged.len(),
        apple_count,
        spotify_count,
        output.display()
    );

    state.last_collection = Some(unix_now());
    state.persist(&paths.state_file())?;
    Ok(())
}

fn write_covers(path: &Path, covers: &[Cover]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(covers)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

fn read_covers(path: &Path) -> Result<Vec<Cover>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read cover list at {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse cover list at {}", path.display()))
}

/// A ready-made developer token wins; otherwise one is minted from the
/// MusicKit signing key and cached while it stays fresh.
fn resolve_developer_token(
    args: &CollectArgs,
    apple: &AppleSection,
    cache: &mut Option<AccessToken>,
    now: u64,
) -> Result<Option<String>> {
    if let Some(token) = args
        .apple_developer_token
        .clone()
        .or_else(|| apple.developer_token.clone())
    {
        return Ok(Some(token));
    }
    let team_id = args.apple_team_id.clone().or_else(|| apple.team_id.clone());
    let key_id = args.apple_key_id.clone().or_else(|| apple.key_id.clone());
    let key_path = args
        .apple_private_key
        .clone()
        .or_else(|| apple.private_key_path.clone());
    match (team_id, key_id, key_path) {
        (Some(team_id), Some(key_id), Some(key_path)) => {
            let key = DeveloperKey::load(team_id, key_id, &key_path)?;
            let token = key.cached_or_mint(cache, now)?;
            Ok(Some(token.value))
        }
        (None, None, None) => Ok(None),
        _ => bail!("signing Apple Music developer tokens needs a team id, key id and private key"),
    }
}

pub fn run_bundle(args: BundleArgs, config: &SaverConfig, paths: &AppPaths) -> Result<()> {
    let options = BundleOptions::from_config(&config.bundle);
    let covers_path = args.covers.unwrap_or_else(|| paths.covers_file());
    let covers = read_covers(&covers_path)?;
    let urls: Vec<String> = covers.into_iter().map(|cover| cover.url).collect();
    if urls.is_empty() {
        warn!(path = %covers_path.display(), "cover list is empty; bundle will show nothing");
    }
    let template = SaverTemplate::load(&args.template, &options.name)?;
    let output = args
        .output
        .unwrap_or_else(|| format!("{}.zip", options.name).into());

    let fetch = http_fetcher(http_client()?);
    let bytes = assemble_bundle(&urls, &template, &options, fetch, |progress| {
        match progress.phase {
            AssemblyPhase::Downloading => debug!(
                current = progress.current,
                total = progress.total,
                "downloading"
            ),
            AssemblyPhase::Assembling => debug!("assembling archive"),
            AssemblyPhase::Done => debug!("archive complete"),
        }
    })?;
    fs::write(&output, &bytes)
        .with_context(|| format!("failed to write bundle to {}", output.display()))?;
    println!(
        "Wrote {} ({} covers, {} bytes)",
        output.display(),
        urls.len(),
        bytes.len()
    );
    Ok(())
}

pub fn run_layout(args: LayoutArgs, config: &SaverConfig) -> Result<()> {
    let source: Box<dyn ImageSource> = if args.covers.join("Contents").is_dir() {
        Box::new(DirectorySource::for_bundle(&args.covers))
    } else {
        Box::new(DirectorySource::new(&args.covers))
    };
    let rng: Box<dyn RandomSource> = match args.seed.or(config.grid.seed) {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(SeededRandom::from_entropy()),
    };
    let viewport = Viewport::new(args.width, args.height);

    let mut view = GridView::new(
        viewport,
        source.as_ref(),
        GridParams::from_config(&config.grid),
        rng,
        ScheduleLog::new(),
    );
    view.start_animation();

    let Some(grid) = view.layout() else {
        println!(
            "No grid: {} cover images for a {}x{} viewport",
            view.images().len(),
            args.width,
            args.height
        );
        return Ok(());
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(grid)?);
        return Ok(());
    }

    let metrics = grid.metrics;
    println!("Viewport:       {}x{}", args.width, args.height);
    println!("Cover images:   {}", view.images().len());
    println!("Tiles per row:  {}", metrics.tiles_per_row);
    println!("Cover size:     {}", metrics.cover_size);
    println!("Rows:           {}", metrics.row_count);
    println!("Tiles:          {} ({} per row)", grid.tile_count(), metrics.tiles_in_row());
    println!("Scroll span:    {}", metrics.set_width);
    println!("Animations:     {}", view.scheduler().active_count());
    Ok(())
}

pub fn run_where(paths: &AppPaths, state: &AppState) -> Result<()> {
    println!("Configuration directories:");
    println!("  config:      {}", paths.config_dir().display());
    println!("  data:        {}", paths.data_dir().display());
    println!("  config file: {}", paths.config_file().display());
    println!("  state:       {}", paths.state_file().display());
    println!("  covers:      {}", paths.covers_file().display());
    if state.usable_spotify_token().is_some() {
        println!("Spotify: authorized");
    } else if state.spotify_verifier.is_some() {
        println!("Spotify: waiting for authorization code");
    }
    if let Some(timestamp) = state.last_collection {
        println!("Last collection (epoch seconds): {timestamp}");
    }
    Ok(())
}
