use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::Parser;

use gsm_config::{toml_config, SharedConfig};
use gsm_core::{debug, GsmTime, TxBurst, STACK_VERSION};
use gsm_l1::{BtsClock, EncoderHalf, L1Context, L1Fec};
use gsm_saps::{ArfcnRadio, BurstSink, FramePrimitive, L2Frame, SapMux, VocoderFrame};

/// Stand-in radio: counts and discards downlink bursts. The real SDR driver
/// plugs in behind the same trait.
struct NullRadio {
    arfcn: u16,
    tx_count: AtomicU64,
    decoders: Mutex<HashMap<u8, Arc<dyn BurstSink>>>,
}

impl NullRadio {
    fn new(arfcn: u16) -> Arc<NullRadio> {
        Arc::new(NullRadio { arfcn, tx_count: AtomicU64::new(0), decoders: Mutex::new(HashMap::new()) })
    }
}

impl ArfcnRadio for NullRadio {
    fn write_high_side(&self, burst: TxBurst) {
        let n = self.tx_count.fetch_add(1, Ordering::Relaxed);
        if n % 1000 == 0 {
            tracing::info!("radio: {} bursts submitted, latest at {}", n + 1, burst.time());
        }
    }

    fn install_decoder(&self, tn: u8, decoder: Arc<dyn BurstSink>) {
        self.decoders.lock().expect("decoder table lock poisoned").insert(tn, decoder);
    }

    fn arfcn(&self) -> u16 {
        self.arfcn
    }
}

/// Stand-in upper layer: logs decoded traffic.
struct LogMux;

impl SapMux for LogMux {
    fn write_low_side(&self, frame: L2Frame, when: GsmTime, rssi: f32, ta: u8, fer: f32) {
        tracing::info!("L2 rx at {}: {:?} RSSI={:.1} TA={} FER={:.3}", when, frame, rssi, ta, fer);
    }

    fn write_low_side_tch(&self, _frame: VocoderFrame, when: GsmTime, rssi: f32, _ta: u8, fer: f32) {
        tracing::info!("speech rx at {}: RSSI={:.1} FER={:.3}", when, rssi, fer);
    }
}

/// Load configuration file
fn load_config_from_toml(cfg_path: &str) -> SharedConfig {
    match toml_config::from_file(cfg_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration from {}: {}", cfg_path, e);
            std::process::exit(1);
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "GSM BlueStation L1",
    long_about = "Runs the GSM BlueStation L1 beacon against a stub radio using the provided TOML configuration"
)]
struct Args {
    /// Config file (required)
    #[arg(help = "TOML config with cell parameters")]
    config: String,
}

fn main() {
    eprintln!("GSM BlueStation L1 {}", STACK_VERSION);

    let args = Args::parse();
    let cfg = load_config_from_toml(&args.config);
    let _log_guard = debug::setup_logging_default(cfg.config().debug_log.clone());

    let clock = Arc::new(BtsClock::new());
    let ctx = L1Context::new(cfg.clone(), clock);
    let radio: Arc<dyn ArfcnRadio> = NullRadio::new(cfg.config().cell.arfcn);
    let mux: Arc<dyn SapMux> = Arc::new(LogMux);

    // The C0T0 beacon channel set
    let channels =
        vec![L1Fec::fcch(&ctx), L1Fec::sch(&ctx), L1Fec::bcch(&ctx), L1Fec::ccch(&ctx, 0), L1Fec::rach(&ctx)];
    for ch in &channels {
        ch.downstream(&radio);
        ch.upstream(&mux);
        ch.open();
        ch.start();
    }
    tracing::info!("beacon up on ARFCN {} (BSIC {})", cfg.config().cell.arfcn, cfg.config().cell.bsic());

    // The BCCH repeats its system information until torn down
    let bcch = &channels[2];
    let sysinfo = L2Frame::new(FramePrimitive::Data, vec![0x2b; 23]);

    // Set up Ctrl+C handler for graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .expect("failed to set Ctrl+C handler");

    while running.load(Ordering::SeqCst) {
        if let Some(enc) = bcch.encoder() {
            enc.write_high_side(sysinfo.clone());
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    tracing::info!("shutting down");
    for ch in &channels {
        ch.close();
        ch.stop();
    }
}
