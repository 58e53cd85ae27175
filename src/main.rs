use clap::{Arg, Command};
use log::LevelFilter;
use rspamd_milter::milter::Milter;
use rspamd_milter::Config;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("rspamd-milter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Milter that gates inbound mail through an rspamd scanner")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/rspamd-milter.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity and show the resolved scanner endpoint")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("daemon")
                .short('d')
                .long("daemon")
                .help("Run as a daemon (background process)")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    // Initialize logger based on verbose flag
    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        println!("Testing configuration...");
        println!("Milter socket: {}", config.socket_path);
        println!(
            "Scanner endpoint: http://{}:{}/checkv2 (timeout {}s)",
            config.main.host, config.main.port, config.main.timeout_secs
        );
        println!("Annotation mode: {:?}", config.main.add_headers);
        println!(
            "Scan gates: local_ip={} private_ip={} authenticated={} relay={}",
            config.check.local_ip,
            config.check.private_ip,
            config.check.authenticated,
            config.check.relay
        );
        match Milter::new(config.clone()) {
            Ok(_) => println!("Configuration validated successfully."),
            Err(e) => {
                println!("Configuration validation failed: {e}");
                process::exit(1);
            }
        }
        return;
    }

    // Handle daemon mode (FreeBSD/Unix)
    if matches.get_flag("daemon") {
        #[cfg(unix)]
        {
            use std::fs::OpenOptions;
            use std::os::unix::io::AsRawFd;

            log::info!("Starting rspamd milter in daemon mode...");

            // First fork
            match unsafe { libc::fork() } {
                -1 => {
                    log::error!("Failed to fork process");
                    process::exit(1);
                }
                0 => {
                    // Child process continues
                }
                _ => {
                    // Parent process exits
                    process::exit(0);
                }
            }

            // Create new session (become session leader)
            if unsafe { libc::setsid() } == -1 {
                log::error!("Failed to create new session");
                process::exit(1);
            }

            // Ignore SIGHUP to prevent daemon from being killed when session leader exits
            unsafe {
                libc::signal(libc::SIGHUP, libc::SIG_IGN);
            }

            // Second fork to ensure we're not a session leader (prevents acquiring controlling terminal)
            match unsafe { libc::fork() } {
                -1 => {
                    log::error!("Failed to second fork");
                    process::exit(1);
                }
                0 => {
                    // Child process continues as daemon
                }
                _ => {
                    // Parent process exits
                    process::exit(0);
                }
            }

            // Change working directory to root to avoid keeping any directory in use
            let root_path = std::ffi::CString::new("/").unwrap();
            if unsafe { libc::chdir(root_path.as_ptr()) } == -1 {
                log::warn!("Failed to change working directory to /");
            }

            // Set file creation mask
            unsafe {
                libc::umask(0);
            }

            // Redirect standard file descriptors to /dev/null instead of closing them
            if let Ok(dev_null) = OpenOptions::new().read(true).write(true).open("/dev/null") {
                let null_fd = dev_null.as_raw_fd();

                unsafe {
                    libc::dup2(null_fd, 0); // stdin
                    libc::dup2(null_fd, 1); // stdout
                    libc::dup2(null_fd, 2); // stderr
                }

                // Don't close dev_null fd as it's being used
                std::mem::forget(dev_null);
            } else {
                log::warn!("Failed to open /dev/null, closing standard file descriptors");
                unsafe {
                    libc::close(0); // stdin
                    libc::close(1); // stdout
                    libc::close(2); // stderr
                }
            }

            // Write PID file for the rc system
            let pid = unsafe { libc::getpid() };
            if let Err(e) = std::fs::write("/var/run/rspamd-milter.pid", pid.to_string()) {
                log::warn!("Failed to write PID file: {e}");
            } else {
                log::info!("PID file written: /var/run/rspamd-milter.pid ({pid})");
            }

            // Set up signal handler to clean up PID file on exit
            let pid_file_path = "/var/run/rspamd-milter.pid";
            ctrlc::set_handler(move || {
                log::info!("Received shutdown signal, cleaning up...");
                if std::path::Path::new(pid_file_path).exists() {
                    if let Err(e) = std::fs::remove_file(pid_file_path) {
                        log::warn!("Failed to remove PID file: {e}");
                    } else {
                        log::info!("PID file removed");
                    }
                }
                std::process::exit(0);
            })
            .expect("Error setting signal handler");

            log::info!("Daemon mode initialization complete");
        }

        #[cfg(not(unix))]
        {
            log::warn!("Daemon mode not supported on this platform, running in foreground");
        }
    }

    log::info!("Starting rspamd milter...");

    let socket_path = config.socket_path.clone();
    let milter = match Milter::new(config) {
        Ok(milter) => milter,
        Err(e) => {
            log::error!("Failed to create milter: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = milter.run(&socket_path).await {
        log::error!("Milter error: {e}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(Config::default())
    }
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
