use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use unsplash_gallery::app::AppContext;
use unsplash_gallery::camera;
use unsplash_gallery::config::GalleryConfig;
use unsplash_gallery::error::AppError;
use unsplash_gallery::models::GalleryItem;

const HELP: &str = "\
unsplash-gallery

USAGE:
  unsplash-gallery [--config PATH] <COMMAND>

COMMANDS:
  list              Print the owned local images
  search [TERM]     Search Unsplash (random sample without TERM) merged with local images
  import PATH...    Copy images into the app's album
  delete LOCATOR    Delete an owned image
  capture           Take a photo with the device camera
  pick              Choose images with the system picker and import them
";

/// How long `capture` and `pick` wait for stored photos to show up
const STORE_WAIT: Duration = Duration::from_secs(30);

enum Command {
    List,
    Search(String),
    Import(Vec<String>),
    Delete(String),
    Capture,
    Pick,
}

struct Args {
    config: Option<PathBuf>,
    command: Command,
}

fn parse_args() -> Result<Option<Args>, AppError> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let config: Option<PathBuf> = args
        .opt_value_from_str("--config")
        .map_err(|e| AppError::Config(e.to_string()))?;
    let name = args
        .subcommand()
        .map_err(|e| AppError::Config(e.to_string()))?;
    let rest: Vec<String> = args
        .finish()
        .into_iter()
        .filter_map(|arg| arg.into_string().ok())
        .collect();

    let command = match name.as_deref() {
        Some("list") => Command::List,
        Some("search") => Command::Search(rest.join(" ")),
        Some("import") if !rest.is_empty() => Command::Import(rest),
        Some("delete") => match rest.into_iter().next() {
            Some(locator) => Command::Delete(locator),
            None => return Err(AppError::Config("delete needs a locator".to_string())),
        },
        Some("capture") => Command::Capture,
        Some("pick") => Command::Pick,
        Some(other) => {
            return Err(AppError::Config(format!(
                "unknown or incomplete command '{}'",
                other
            )))
        }
        None => return Ok(None),
    };
    Ok(Some(Args { config, command }))
}

#[cfg(target_os = "android")]
fn init_logger() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("unsplash-gallery"),
    );
}

#[cfg(not(target_os = "android"))]
fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

fn print_items(items: &[GalleryItem]) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(items).map_err(|e| AppError::Other(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn local_count(items: &[GalleryItem]) -> usize {
    items.iter().filter(|item| item.is_local).count()
}

async fn run(args: Args) -> Result<(), AppError> {
    let config = GalleryConfig::load(args.config.as_deref())?;
    let context = AppContext::init(config)?;
    let repository = context.repository();

    match args.command {
        Command::List => print_items(&repository.local_items().await)?,
        Command::Search(term) => {
            let controller = context.start_controller(&term);
            controller.settled().await;
            print_items(&controller.items().borrow())?;
            if let Some(message) = controller.error().borrow().as_ref() {
                eprintln!("{}", message);
            }
            controller.shutdown();
        }
        Command::Import(paths) => {
            let cancel = CancellationToken::new();
            let mut failed = 0usize;
            for path in &paths {
                match repository.import_external_image(path, &cancel).await {
                    Ok(Some(locator)) => println!("{} -> {}", path, locator),
                    Ok(None) => {
                        eprintln!("{}: import failed", path);
                        failed += 1;
                    }
                    Err(_) => return Err(AppError::Other("import cancelled".to_string())),
                }
            }
            if failed > 0 {
                return Err(AppError::Other(format!(
                    "{} of {} imports failed",
                    failed,
                    paths.len()
                )));
            }
        }
        Command::Delete(locator) => {
            if !media_store::is_content_locator(&locator) {
                return Err(AppError::Other(format!(
                    "{} is not an owned image locator",
                    locator
                )));
            }
            if !repository.delete_owned_image(&locator).await {
                return Err(AppError::Other(unsplash_gallery::error::MSG_DELETE_FAILED.to_string()));
            }
            println!("Deleted {}", locator);
        }
        Command::Capture => {
            let controller = context.start_controller("");
            controller.settled().await;
            let name = camera::capture_into(&controller).await?;

            let mut items = controller.items();
            let stored = tokio::time::timeout(
                STORE_WAIT,
                items.wait_for(|items| {
                    items.iter().any(|item| {
                        item.is_local
                            && item
                                .description
                                .as_deref()
                                .is_some_and(|d| d.starts_with(&name))
                    })
                }),
            )
            .await;
            if !matches!(stored, Ok(Ok(_))) {
                let message = controller.error().borrow().clone();
                return Err(AppError::Other(
                    message.unwrap_or_else(|| "capture was not stored".to_string()),
                ));
            }
            println!("Stored {}", name);
            controller.shutdown();
        }
        Command::Pick => {
            let controller = context.start_controller("");
            controller.settled().await;
            let before = local_count(&controller.items().borrow());

            let picked = camera::pick_into(&controller).await?;
            if picked == 0 {
                println!("Nothing picked");
                return Ok(());
            }

            let mut items = controller.items();
            let stored = tokio::time::timeout(
                STORE_WAIT,
                items.wait_for(|items| local_count(items) >= before + picked),
            )
            .await;
            if !matches!(stored, Ok(Ok(_))) {
                let message = controller.error().borrow().clone();
                return Err(AppError::Other(
                    message.unwrap_or_else(|| "picked images were not stored".to_string()),
                ));
            }
            println!("Imported {} images", picked);
            controller.shutdown();
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_logger();

    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => {
            print!("{}", HELP);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, HELP);
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
