//! Command-line front end for the kiln pipeline.
//!
//! Every command loads the launcher directory and `config.json`,
//! then hands off to `kiln_instances` / `kiln_java_handler`.
//! Errors are printed and turned into a non-zero exit code.

use std::{process::ExitCode, sync::mpsc, thread::JoinHandle};

use clap::Parser;
use kiln_core::{
    config::LauncherConfig,
    err, info,
    json::{Manifest, VersionDescriptor},
    logger_finish, pt, IntoStringError,
    LauncherDirs, Platform, ProgressEvent, ProgressSender,
};
use kiln_instances::{download, Credentials, InstallationRecord};
use tokio_util::sync::CancellationToken;

mod cli;

use cli::{Cli, Commands, JavaCommands};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = run(cli.command).await;
    let code = match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            err!("{error}");
            ExitCode::FAILURE
        }
    };
    logger_finish();
    code
}

struct Context {
    dirs: LauncherDirs,
    config: LauncherConfig,
    cancel: CancellationToken,
}

impl Context {
    async fn load() -> Result<Self, String> {
        let dirs = LauncherDirs::locate().strerr()?;
        let config = LauncherConfig::load(&dirs).await.strerr()?;

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                err!("Interrupted, stopping...");
                on_interrupt.cancel();
            }
        });

        Ok(Self {
            dirs,
            config,
            cancel,
        })
    }
}

async fn run(command: Commands) -> Result<(), String> {
    let ctx = Context::load().await?;
    match command {
        Commands::Create {
            name,
            version,
            loader,
            loader_version,
        } => {
            let record =
                InstallationRecord::new(&name, &version, loader, loader_version.as_deref());
            record.create(&ctx.dirs).await.strerr()?;
            info!("Created {name} ({version}, {loader})");
        }
        Commands::Install { name } => {
            install(&ctx, &name).await?;
        }
        Commands::Launch { name, username } => {
            launch(&ctx, &name, username).await?;
        }
        Commands::Delete { name } => {
            InstallationRecord::delete(&ctx.dirs, &name).await.strerr()?;
        }
        Commands::List => {
            for name in InstallationRecord::list(&ctx.dirs).await.strerr()? {
                match InstallationRecord::load(&ctx.dirs, &name).await {
                    Ok(record) => println!(
                        "{}\t{}\t{}",
                        record.name,
                        record.game_version,
                        record.loader
                    ),
                    Err(error) => err!("{name}: {error}"),
                }
            }
        }
        Commands::Versions { all } => {
            let manifest = Manifest::download(&ctx.config.endpoints.version_manifest)
                .await
                .strerr()?;
            for version in manifest
                .versions
                .iter()
                .filter(|v| all || v.kind == "release")
            {
                println!("{}", version.id);
            }
        }
        Commands::Java(JavaCommands::List) => {
            let runtimes = kiln_java_handler::discover(&ctx.dirs).await;
            if runtimes.system.is_empty() && runtimes.managed.is_empty() {
                info!("No Java runtimes found");
            }
            for runtime in runtimes.managed.iter().chain(&runtimes.system) {
                println!("{runtime}");
            }
        }
        Commands::Java(JavaCommands::Install { major }) => {
            let downloader = download::downloader(&ctx.config, ctx.cancel.clone());
            let (progress, bar) = progress_bar();
            let result = kiln_java_handler::install(
                major,
                &ctx.dirs,
                &ctx.config.endpoints,
                &downloader,
                &progress,
            )
            .await;
            finish_bar(progress, bar);
            let runtime = result.strerr()?;
            info!("Installed {runtime}");
        }
    }
    Ok(())
}

/// Resolves and downloads everything `name` needs.
async fn install(
    ctx: &Context,
    name: &str,
) -> Result<(InstallationRecord, VersionDescriptor), String> {
    let mut record = InstallationRecord::load(&ctx.dirs, name).await.strerr()?;
    info!(
        "Installing {name} ({} {}{})",
        record.game_version,
        record.loader,
        record
            .loader_version
            .as_deref()
            .map(|v| format!(" {v}"))
            .unwrap_or_default()
    );

    let descriptor = kiln_instances::resolve(&mut record, &ctx.dirs, &ctx.config, ctx.cancel.clone())
        .await
        .strerr()?;
    pt!("Resolved {}", descriptor.id);

    let downloader = download::downloader(&ctx.config, ctx.cancel.clone());
    let (progress, bar) = progress_bar();
    let result = kiln_instances::acquire(
        &descriptor,
        Platform::current(),
        &ctx.dirs,
        &ctx.config,
        &downloader,
        &progress,
    )
    .await;
    finish_bar(progress, bar);
    let report = result.strerr()?;
    info!(
        "Finished installing {name}: {} downloaded, {} already present, {} virtual copies",
        report.files.downloaded, report.files.already_present, report.virtual_copies
    );
    Ok((record, descriptor))
}

async fn launch(ctx: &Context, name: &str, username: Option<String>) -> Result<(), String> {
    let username = username.unwrap_or_else(|| ctx.config.username.clone());
    let credentials = Credentials::offline(&username);
    credentials.validate().strerr()?;

    let (record, descriptor) = install(ctx, name).await?;

    let downloader = download::downloader(&ctx.config, ctx.cancel.clone());
    let settings = record.effective(&ctx.config);
    let (progress, bar) = progress_bar();
    let runtime = kiln_instances::select_runtime(
        &descriptor,
        &settings,
        &ctx.dirs,
        &ctx.config,
        &downloader,
        &progress,
    )
    .await;
    finish_bar(progress, bar);
    let runtime = runtime.strerr()?;

    let mut game = kiln_instances::launch(
        &descriptor,
        &record,
        &runtime,
        &credentials,
        &ctx.dirs,
        &ctx.config,
        false,
    )
    .await
    .strerr()?;
    info!("Game started (pid {:?})", game.pid());

    let exited = tokio::select! {
        status = game.wait() => Some(status),
        () = ctx.cancel.cancelled() => None,
    };
    let Some(status) = exited else {
        game.kill().await.strerr()?;
        return Ok(());
    };
    let status = status.strerr()?;
    if status.success() {
        info!("Game exited");
        Ok(())
    } else {
        Err(format!("game crashed ({status})"))
    }
}

/// A terminal progress bar fed by a [`ProgressSender`].
///
/// The bar lives on its own thread, so the returned sender
/// must be dropped (see [`finish_bar`]) for that thread to exit.
fn progress_bar() -> (ProgressSender, JoinHandle<()>) {
    const STEPS: u64 = 1000;

    let (sender, receiver) = mpsc::channel::<ProgressEvent>();
    let handle = std::thread::spawn(move || {
        let bar = indicatif::ProgressBar::new(STEPS);
        bar.set_style(
            indicatif::ProgressStyle::with_template("{bar:40.cyan/blue} {percent:>3}% {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar()),
        );
        for event in receiver {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            bar.set_position((event.fraction * STEPS as f32) as u64);
            bar.set_message(event.to_string());
        }
        bar.finish_and_clear();
    });
    (ProgressSender::new(sender), handle)
}

fn finish_bar(progress: ProgressSender, bar: JoinHandle<()>) {
    drop(progress);
    if bar.join().is_err() {
        err!("Progress bar thread panicked");
    }
}
