use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

use clap::Parser;
use gptp_core::clock::Clock;
use gptp_core::config::InstanceConfig;
use gptp_core::datastructures::common::ClockIdentity;
use gptp_core::network::Event as NetEvent;
use gptp_core::orchestrator::Orchestrator;
use gptp_core::time::Time;
use gptp_linux::clock::LinuxClock;
use gptp_linux::config::Config;
use gptp_linux::ipc::{ClockDInfo, IpcResponse, IpcService};
use gptp_linux::network::{get_clock_id, LinuxNetworkRuntime, PortSetup};
use gptp_linux::shared_mem::SharedMemoryWriter;
use timestamped_socket::interface::InterfaceName;
use timestamped_socket::socket::InterfaceTimestampMode;

/// `gptpd`: the IEEE 802.1AS time-synchronization daemon.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the daemon's TOML configuration file.
    #[clap(short = 'c', long = "config")]
    config_file: PathBuf,

    /// Comma-separated interface names to run gPTP on, overriding the
    /// config file's port list.
    #[clap(short = 'd', long = "devlist", value_delimiter = ',')]
    devlist: Option<Vec<String>>,

    /// Override the configured max-ports.
    #[clap(short = 'n', long = "maxports")]
    max_ports: Option<u16>,

    /// Override the configured max-domains.
    #[clap(short = 'm', long = "maxdomains")]
    max_domains: Option<u8>,

    /// Local clock priority1 override.
    #[clap(short = 'p', long = "priority1")]
    priority1: Option<u8>,

    /// Local clock priority2 override.
    #[clap(long = "priority2")]
    priority2: Option<u8>,

    /// Step the clock to this many nanoseconds since the epoch before
    /// starting the protocol.
    #[clap(short = 't', long = "inittm")]
    init_time_ns: Option<i64>,

    #[clap(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[clap(short = 'q', long, action = clap::ArgAction::Count)]
    quiet: u8,
}

fn log_level(config: &Config, args: &Args) -> tracing::Level {
    let mut level = tracing::Level::from(config.loglevel);
    for _ in 0..args.verbose {
        level = match level {
            tracing::Level::ERROR => tracing::Level::WARN,
            tracing::Level::WARN => tracing::Level::INFO,
            tracing::Level::INFO => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        };
    }
    for _ in 0..args.quiet {
        level = match level {
            tracing::Level::TRACE => tracing::Level::DEBUG,
            tracing::Level::DEBUG => tracing::Level::INFO,
            tracing::Level::INFO => tracing::Level::WARN,
            _ => tracing::Level::ERROR,
        };
    }
    level
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match Config::from_file(&args.config_file) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("fatal configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Some(max_ports) = args.max_ports {
        config.max_ports = max_ports;
    }
    if let Some(max_domains) = args.max_domains {
        config.max_domains = max_domains;
    }
    if let Some(priority1) = args.priority1 {
        config.priority1 = priority1;
    }
    if let Some(priority2) = args.priority2 {
        config.priority2 = priority2;
    }
    if let Some(devlist) = &args.devlist {
        for (index, port) in config.ports.iter_mut().enumerate() {
            if let Some(name) = devlist.get(index) {
                port.interface = name.clone();
            }
        }
    }

    gptp_linux::setup_logging(log_level(&config, &args)).expect("logging already installed");

    let resolved_identity = ClockIdentity(get_clock_id().unwrap_or([0; 8]));
    let instance: InstanceConfig = config.instance_config(resolved_identity);

    let mut orchestrator: Orchestrator<LinuxClock> = Orchestrator::new(instance);
    let mut net = LinuxNetworkRuntime::new();

    for domain in config.domains.iter() {
        let domain_config = domain.core_config(&instance);
        let mut clock = match LinuxClock::system() {
            Ok(clock) => clock,
            Err(err) => {
                tracing::error!("could not open clock for domain {}: {err:?}", domain.domain_number);
                std::process::exit(1);
            }
        };
        if let Some(init_ns) = args.init_time_ns {
            if let Err(err) = clock.set_ts64(Time::from_fixed_nanos(init_ns as i128)) {
                tracing::error!("could not set initial time for domain {}: {err:?}", domain.domain_number);
                std::process::exit(1);
            }
        }
        if let Err(err) = orchestrator.add_domain(domain_config, clock, true) {
            tracing::error!("could not register domain {}: {err}", domain.domain_number);
            std::process::exit(1);
        }
    }

    for (port_index, port) in config.ports.iter().enumerate() {
        let port_index = port_index as u16;
        if let Err(err) = orchestrator.add_port(port.core_config(port_index)) {
            tracing::error!("could not register port {port_index}: {err}");
            std::process::exit(1);
        }

        let Ok(interface) = InterfaceName::from_str(&port.interface) else {
            tracing::error!("invalid interface name: {}", port.interface);
            std::process::exit(1);
        };
        let timestamping = if port.hardware_clock.is_some() {
            InterfaceTimestampMode::Hardware
        } else {
            InterfaceTimestampMode::Software
        };
        if let Err(err) = net.open_port(PortSetup { port_index, interface, timestamping, bind_phc: port.hardware_clock }) {
            tracing::error!("could not open port {port_index} on {}: {err}", port.interface);
            std::process::exit(1);
        }
        if let Err(err) = orchestrator.port_up(port_index, Time::from_fixed_nanos(0)) {
            tracing::error!("could not bring up port {port_index}: {err}");
            std::process::exit(1);
        }
    }

    let shared_mem = SharedMemoryWriter::create(&config.shared_memory.name, config.max_domains as usize)
        .map_err(|err| tracing::warn!("shared-memory publishing disabled: {err}"))
        .ok();

    let ipc = IpcService::bind(&config.ipc.socket_path, config.ipc.permissions)
        .map_err(|err| tracing::warn!("IPC socket disabled: {err}"))
        .ok();

    tracing::info!("gptpd started with {} port(s), {} domain(s)", config.ports.len(), config.domains.len());

    let mut shutdown = Box::pin(shutdown_signal());
    let mut tick = tokio::time::interval(StdDuration::from_millis(25));

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutting down on signal");
                break;
            }
            _ = tick.tick() => {
                let now = Time::from_fixed_nanos(std_now_nanos());
                if let Err(err) = orchestrator.handle_event(&mut net, NetEvent::Timeout, now) {
                    tracing::warn!("timeout handling error: {err}");
                }

                while let Some(event) = net.poll() {
                    let is_dev_up = matches!(event, NetEvent::DevUp { .. });
                    let port_index = match &event {
                        NetEvent::DevUp { port_index, .. } | NetEvent::DevDown { port_index } => Some(*port_index),
                        _ => None,
                    };
                    if let Err(err) = orchestrator.handle_event(&mut net, event, now) {
                        tracing::debug!("event handling error: {err}");
                    }
                    if is_dev_up {
                        if let Some(port_index) = port_index {
                            let _ = orchestrator.port_up(port_index, now);
                        }
                    }
                }

                for notice in orchestrator.drain_notices() {
                    tracing::info!("{notice}");
                }

                if let Some(shared_mem) = &shared_mem {
                    publish_shared_memory(&orchestrator, shared_mem, &config.ports);
                }
                if let Some(ipc) = &ipc {
                    answer_ipc_requests(&orchestrator, ipc);
                }
            }
        }
    }
}

fn std_now_nanos() -> i128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as i128)
        .unwrap_or(0)
}

/// Mirrors every registered domain's clock state into the shared-memory
/// region, using the first configured port's interface name as that
/// domain's representative `ptpdev` (C1's layout has one device name per
/// slot, not per port).
fn publish_shared_memory(orchestrator: &Orchestrator<LinuxClock>, shared_mem: &SharedMemoryWriter, ports: &[gptp_linux::config::PortConfig]) {
    let ptpdev = ports.first().map(|p| p.interface.as_str()).unwrap_or("");
    for (domain_index, domain_number) in orchestrator.domain_numbers().enumerate() {
        if let Ok(snapshot) = orchestrator.clock_snapshot(domain_number) {
            shared_mem.publish(domain_index, ptpdev, domain_number, snapshot);
        }
    }
}

/// Answers any pending IPC queries with the orchestrator's current state.
fn answer_ipc_requests(orchestrator: &Orchestrator<LinuxClock>, ipc: &IpcService) {
    while let Some((request, addr)) = ipc.try_recv() {
        use gptp_linux::ipc::IpcCommand::*;
        let response = match request.cmd {
            GetClockD => orchestrator.clock_snapshot(request.domain_number).ok().map(|snapshot| {
                IpcResponse::ClockD(ClockDInfo {
                    domain_number: request.domain_number,
                    clock_index: request.domain_index,
                    gmsync: snapshot.gmsync,
                    gmchange_ind: snapshot.gmchange_ind,
                    offset64: snapshot.offset64,
                    adjrate: snapshot.adjrate,
                })
            }),
            _ => None,
        };
        if let Some(response) = response {
            ipc.try_reply(&addr, &response);
        }
    }
}

async fn shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}
