//! Server implementation

#![warn(missing_docs)]

mod http;
mod seed;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use allot_core::{Config, RequestHandler};
use allot_rocket::Database;
use eyre::{eyre, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use seed::Seed;

/// Command line options
#[derive(Debug)]
struct Opts {
    /// Configuration of the allotment
    config: Config,

    /// Port for the HTTP server to listen on
    port: u16,
    /// Host for the HTTP server to listen on
    host: String,
    /// Number of balancer threads
    balancer_threads: u32,

    /// TOML file with users and bookings to start with
    seed: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is not set
    log_level: String,
}

impl Opts {
    fn from_args() -> Self {
        let mut opts = Opts {
            port: 8585,
            host: String::from("127.0.0.1"),
            config: Config::default(),
            balancer_threads: 8,
            seed: None,
            log_level: String::from("info"),
        };

        let mut option: Option<String> = None;
        for arg in std::env::args().skip(1) {
            if let Some(opt) = option {
                match opt.as_str() {
                    "-port" => opts.port = arg.parse().expect("-port takes a decimal u16"),
                    "-host" => opts.host = arg,
                    "-spots" => opts.config.spots = arg.parse().expect("-spots takes a decimal u32"),
                    "-policy" => {
                        opts.config.policy = arg
                            .parse()
                            .expect("-policy takes one-per-user or per-booking")
                    }
                    "-reconcile-interval" => {
                        opts.config.reconcile_interval = arg
                            .parse()
                            .expect("-reconcile-interval takes a decimal u32")
                    }
                    "-balancer-threads" => {
                        opts.balancer_threads =
                            arg.parse().expect("-balancer-threads takes a decimal u32")
                    }
                    "-seed" => opts.seed = Some(PathBuf::from(arg)),
                    "-log-level" => opts.log_level = arg,
                    _ => {
                        eprintln!("Error: ignoring unknown option {opt}");
                        std::process::exit(1);
                    }
                }
                option = None;
            } else {
                option = Some(arg);
            }
        }
        if let Some(opt) = option {
            eprintln!("Error: ignoring leftover option {opt}");
            std::process::exit(1);
        }

        opts
    }
}

fn http_loop<H: RequestHandler>(server: &tiny_http::Server, handler: &H) {
    loop {
        let rq = server.recv().expect("HTTP receive failed");
        if let Some(rq) = http::parse(rq) {
            handler.handle(rq);
        }
    }
}

fn main() -> Result<()> {
    let opts = Opts::from_args();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database = Arc::new(Database::new());
    if let Some(path) = &opts.seed {
        let seed = Seed::load(path)?;
        seed.apply(&database);
        info!(
            users = seed.users.len(),
            bookings = seed.bookings.len(),
            "store seeded"
        );
    }

    let server = tiny_http::Server::http((opts.host.as_str(), opts.port))
        .map_err(|err| eyre!("could not bind {}:{}: {err}", opts.host, opts.port))?;
    info!(host = %opts.host, port = opts.port, "listening");

    let balancer = allot_rocket::launch(&opts.config, database);

    thread::scope(|s| {
        for i in 0..opts.balancer_threads {
            thread::Builder::new()
                .name(format!("balancer_{i}"))
                .spawn_scoped(s, || http_loop(&server, &balancer))
                .unwrap();
        }
    });

    Ok(())
}
