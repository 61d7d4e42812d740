use std::env;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

use pageview_core::wire::EventTranscript;
use pageview_core::ErrorView;
use pageview_core::JobToken;
use pageview_core::PageId;
use pageview_core::PageViewConfig;
use pageview_core::UserId;
use pageview_host::Collaborators;
use pageview_host::InMemoryMutations;
use pageview_host::InMemoryQueries;
use pageview_host::MemoryLocation;
use pageview_host::PageViewController;
use pageview_host::ScriptedTransport;
use pageview_host::SharedJobSlot;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let (config_path, args) = split_config_arg(env::args().skip(1).collect())?;
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("pageview {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "replay" => {
            let config = load_config(config_path.as_deref())?;
            let opts = parse_replay_args(args.collect())?;
            replay(&config, opts)
        }
        "show" => {
            let config = load_config(config_path.as_deref())?;
            let opts = parse_show_args(args.collect())?;
            show(&config, opts)
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

fn split_config_arg(
    args: Vec<String>,
) -> Result<(Option<PathBuf>, Vec<String>), Box<dyn std::error::Error>> {
    let mut config = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let Some(value) = iter.next() else {
                return Err("--config requires a path".into());
            };
            config = Some(PathBuf::from(value));
        } else {
            rest.push(arg);
        }
    }
    Ok((config, rest))
}

fn load_config(explicit: Option<&Path>) -> Result<PageViewConfig, Box<dyn std::error::Error>> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| dirs::config_dir().map(|dir| dir.join("pageview").join("config.toml")));
    let config = PageViewConfig::load(path.as_deref())?;
    info!(
        path = ?path,
        section_page_size = config.section_page_size,
        reveal_delay_ms = config.reveal_delay_ms,
        "config loaded"
    );
    Ok(config)
}

struct ReplayOpts {
    transcript: PathBuf,
    record: Option<PathBuf>,
    viewer: Option<UserId>,
    stop_after: Option<usize>,
}

fn parse_replay_args(args: Vec<String>) -> Result<ReplayOpts, Box<dyn std::error::Error>> {
    let mut transcript = None;
    let mut record = None;
    let mut viewer = None;
    let mut stop_after = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--viewer" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--viewer requires a user id".into());
                };
                viewer = Some(UserId::from(value.as_str()));
                i += 2;
            }
            "--record" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--record requires a path".into());
                };
                record = Some(PathBuf::from(value));
                i += 2;
            }
            "--stop-after" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--stop-after requires a count".into());
                };
                stop_after = Some(
                    value
                        .parse::<usize>()
                        .map_err(|_| format!("invalid --stop-after value: {value}"))?,
                );
                i += 2;
            }
            other if other.starts_with("--") => {
                return Err(format!("unsupported argument: {other}").into());
            }
            other => {
                if transcript.is_some() {
                    return Err(format!("unexpected argument: {other}").into());
                }
                transcript = Some(PathBuf::from(other));
                i += 1;
            }
        }
    }
    let Some(transcript) = transcript else {
        return Err("replay requires a transcript path".into());
    };
    Ok(ReplayOpts {
        transcript,
        record,
        viewer,
        stop_after,
    })
}

struct ShowOpts {
    fixture: PathBuf,
    page: PageId,
    viewer: Option<UserId>,
}

fn parse_show_args(args: Vec<String>) -> Result<ShowOpts, Box<dyn std::error::Error>> {
    let mut fixture = None;
    let mut page = None;
    let mut viewer = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--page" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--page requires a page id".into());
                };
                page = Some(PageId::from(value.as_str()));
                i += 2;
            }
            "--viewer" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--viewer requires a user id".into());
                };
                viewer = Some(UserId::from(value.as_str()));
                i += 2;
            }
            other if other.starts_with("--") => {
                return Err(format!("unsupported argument: {other}").into());
            }
            other => {
                if fixture.is_some() {
                    return Err(format!("unexpected argument: {other}").into());
                }
                fixture = Some(PathBuf::from(other));
                i += 1;
            }
        }
    }
    let Some(fixture) = fixture else {
        return Err("show requires a fixture path".into());
    };
    let Some(page) = page else {
        return Err("show requires --page".into());
    };
    Ok(ShowOpts {
        fixture,
        page,
        viewer,
    })
}

fn replay(config: &PageViewConfig, opts: ReplayOpts) -> Result<(), Box<dyn std::error::Error>> {
    let controller = replay_view(config, &opts)?;
    print_view(&controller, opts.viewer.as_ref());
    Ok(())
}

/// Runs the transcript through a controller; with `--record`, applied events land in a new transcript.
fn replay_view(
    config: &PageViewConfig,
    opts: &ReplayOpts,
) -> Result<PageViewController, Box<dyn std::error::Error>> {
    let events = EventTranscript::open(&opts.transcript)?.load()?;
    info!(path = %opts.transcript.display(), events = events.len(), "replaying transcript");

    let job = JobToken::from("replay");
    let jobs = SharedJobSlot::new();
    jobs.set(job.clone());
    let collaborators = Collaborators {
        transport: Box::new(ScriptedTransport::new().with_events(&job, events)),
        queries: Box::new(InMemoryQueries::default()),
        mutations: Box::new(InMemoryMutations::new()),
        jobs: Box::new(jobs),
        location: Box::new(MemoryLocation::new(config.path_prefix.clone())),
    };
    let mut controller = PageViewController::new(config, collaborators);
    if let Some(path) = &opts.record {
        controller = controller.with_transcript(EventTranscript::open(path)?);
    }
    controller.mount();

    match opts.stop_after {
        Some(limit) => {
            let mut delivered = 0;
            while delivered < limit && controller.poll_stream() {
                delivered += 1;
            }
            controller.stop();
        }
        None => {
            controller.run_stream();
            // A transcript without a completion event leaves the view converting.
            controller.stop();
        }
    }
    Ok(controller)
}

fn show(config: &PageViewConfig, opts: ShowOpts) -> Result<(), Box<dyn std::error::Error>> {
    let queries = InMemoryQueries::from_yaml_path(&opts.fixture)?;
    let path = format!("{}/{}", config.path_prefix, opts.page);
    let collaborators = Collaborators {
        transport: Box::new(ScriptedTransport::new()),
        queries: Box::new(queries),
        mutations: Box::new(InMemoryMutations::new()),
        jobs: Box::new(SharedJobSlot::new()),
        location: Box::new(MemoryLocation::at_page(path, opts.page)),
    };
    let mut controller = PageViewController::new(config, collaborators);
    controller.mount();

    print_view(&controller, opts.viewer.as_ref());
    Ok(())
}

fn print_view(controller: &PageViewController, viewer: Option<&UserId>) {
    let state = controller.state();
    let flags = controller.flags(viewer, Instant::now());

    match &flags.error_view {
        Some(ErrorView::NotFound) => println!("page not found"),
        Some(ErrorView::Generic { message }) => println!("error: {message}"),
        None => {}
    }

    if let Some(page) = &state.page {
        println!("# {} ({})", page.title, page.id);
        println!("author: {}", page.author_id);
        println!("updated: {}", page.updated_at.to_rfc3339());
        if !page.content.is_empty() {
            println!();
            println!("{}", page.content);
        }
    }

    for section in &state.sections {
        let marker = if flags.generating_sections.contains(&section.id) {
            " [generating]"
        } else {
            ""
        };
        println!();
        println!("## {}{marker}", section.title);
        if !section.content.is_empty() {
            println!("{}", section.content);
        }
    }

    println!();
    println!(
        "ready: {}  loading: {}  owner: {}  can add sections: {}",
        flags.is_ready, flags.is_loading, flags.is_owner, flags.show_section_input
    );
    for notice in state.notices.iter() {
        println!("[{}] {}", notice.level.label(), notice.message);
    }
}

fn print_help() {
    println!("pageview {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  pageview [--config PATH] replay TRANSCRIPT [--record PATH] [--viewer USER] [--stop-after N]");
    println!("  pageview [--config PATH] show FIXTURE --page ID [--viewer USER]");
    println!("  pageview --help");
    println!("  pageview --version");
}

#[cfg(test)]
mod tests {
    use pageview_core::PageId;
    use pageview_core::StreamEvent;
    use pretty_assertions::assert_eq;

    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    fn write_transcript(path: &Path) -> Vec<StreamEvent> {
        let events = vec![
            StreamEvent::PageCreated {
                id: PageId::from("1"),
                author_id: UserId::from("alice"),
                title: "Notes".to_string(),
            },
            StreamEvent::PageContentDelta {
                delta: "Hel".to_string(),
            },
            StreamEvent::PageContentDelta {
                delta: "lo".to_string(),
            },
            StreamEvent::PageCompleted {
                id: PageId::from("1"),
            },
        ];
        let mut transcript = EventTranscript::open(path).expect("open transcript");
        for event in &events {
            transcript.append(event).expect("append");
        }
        events
    }

    #[test]
    fn replay_args_accept_record_and_stop_after() {
        let opts = parse_replay_args(args(&[
            "in.jsonl",
            "--record",
            "out.jsonl",
            "--stop-after",
            "2",
        ]))
        .expect("parse");
        assert_eq!(opts.transcript, PathBuf::from("in.jsonl"));
        assert_eq!(opts.record, Some(PathBuf::from("out.jsonl")));
        assert_eq!(opts.stop_after, Some(2));
        assert!(parse_replay_args(args(&["in.jsonl", "--record"])).is_err());
    }

    #[test]
    fn config_flag_is_split_from_command_args() {
        let (config, rest) =
            split_config_arg(args(&["--config", "pv.toml", "show", "f.yaml"])).expect("split");
        assert_eq!(config, Some(PathBuf::from("pv.toml")));
        assert_eq!(rest, args(&["show", "f.yaml"]));
    }

    #[test]
    fn replay_records_only_the_events_it_applied() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("in.jsonl");
        let record = dir.path().join("out.jsonl");
        let events = write_transcript(&source);

        let controller = replay_view(
            &PageViewConfig::default(),
            &ReplayOpts {
                transcript: source,
                record: Some(record.clone()),
                viewer: None,
                stop_after: Some(2),
            },
        )
        .expect("replay");

        assert_eq!(
            controller.state().page.as_ref().map(|p| p.content.as_str()),
            Some("Hel")
        );
        assert!(!controller.state().loading);
        let recorded = EventTranscript::open(&record)
            .expect("reopen")
            .load()
            .expect("load");
        assert_eq!(recorded, events[..2].to_vec());
    }

    #[test]
    fn full_replay_settles_the_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("in.jsonl");
        write_transcript(&source);

        let controller = replay_view(
            &PageViewConfig::default(),
            &ReplayOpts {
                transcript: source,
                record: None,
                viewer: None,
                stop_after: None,
            },
        )
        .expect("replay");

        assert!(controller.state().is_settled());
        assert_eq!(
            controller.state().page.as_ref().map(|p| p.content.as_str()),
            Some("Hello")
        );
    }
}
