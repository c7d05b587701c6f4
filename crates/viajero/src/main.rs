//! Viajero binary: serve the HTTP API, seed catalogs, or run one case.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use viajar::SessionConfig;
use viajero::cli::{Cli, Commands, ServeArgs};
use viajero::error::ServeResult;
use viajero::routes::{router, AppState};
use viajero::store::Store;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> ServeResult<()> {
    init_tracing();

    let cli = Cli::parse();
    let store = Store::open(&cli.database)?;

    match cli.command {
        Commands::Serve(args) => run_serve(store, &args),
        Commands::Seed => run_seed(&store),
        Commands::Run(args) => run_case(&store, &args),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_session(headed: bool, chrome_path: Option<&str>, no_sandbox: bool) -> SessionConfig {
    let mut session = SessionConfig::default().with_headless(!headed);
    if no_sandbox {
        session = session.with_no_sandbox();
    }
    if let Some(path) = chrome_path {
        session = session.with_chrome_path(path);
    }
    session
}

fn run_serve(store: Store, args: &ServeArgs) -> ServeResult<()> {
    let session = build_session(args.headed, args.chrome_path.as_deref(), args.no_sandbox);
    let state = Arc::new(AppState::new(store, args.base_url.clone(), session));
    let app = router(state);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let listener = tokio::net::TcpListener::bind(&args.addr).await?;
        tracing::info!("Viajero API listening on http://{}", args.addr);
        axum::serve(listener, app).await?;
        Ok(())
    })
}

fn run_seed(store: &Store) -> ServeResult<()> {
    let inserted = store.seed_demo()?;
    println!("Seeded {inserted} catalog steps");
    Ok(())
}

#[cfg(feature = "browser")]
fn run_case(store: &Store, args: &viajero::cli::RunArgs) -> ServeResult<()> {
    use viajar::{CdpSession, Mode, ParameterBag, Runner, RunnerConfig};
    use viajero::error::ServeError;

    let mode = Mode::parse(&args.mode)
        .ok_or_else(|| ServeError::config(format!("unknown mode: {}", args.mode)))?;
    let steps = store.load_steps(&args.test_case_id, mode)?.ok_or_else(|| {
        ServeError::config(format!(
            "no step catalog for test case {} in mode {}",
            args.test_case_id,
            mode.as_str()
        ))
    })?;

    let mut parameters = ParameterBag::new(mode);
    for pair in &args.params {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ServeError::config(format!(
                "bad --param {pair:?}, expected key=value"
            )));
        };
        parameters.insert(key.trim(), value.trim());
    }

    let session = build_session(args.headed, args.chrome_path.as_deref(), args.no_sandbox);
    let runner = Runner::new(RunnerConfig::new(args.base_url.clone()));

    let rt = tokio::runtime::Runtime::new()?;
    let result = rt.block_on(runner.execute(&args.test_case_id, &steps, parameters, || {
        CdpSession::launch(session)
    }));

    let result_id = store.save_result(&result)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    eprintln!("Stored as result {result_id}");
    Ok(())
}

#[cfg(not(feature = "browser"))]
fn run_case(_store: &Store, _args: &viajero::cli::RunArgs) -> ServeResult<()> {
    Err(viajero::error::ServeError::config(
        "browser support not compiled in; rebuild with --features browser",
    ))
}
