//! Main line follower executable entry point.
//!
//! # Architecture
//!
//! The executive runs three periodic tasks, each on its own thread:
//!
//!     - Navigation: frame -> line error -> NavCtrl -> actuator controller
//!     - Colour detection: while a target colour is armed, report whether it is in view
//!     - Power monitoring: battery state of charge estimation
//!
//! The main thread serves telecommands from the operator console until Ctrl-C is pressed, then
//! stops the tasks and waits for them, so that the battery charge is flushed before exit.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use comms_if::{eqpt::power::BatteryTm, net::zmq, tc::BatteryReset};
use log::{info, warn};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

// Internal
use follower_lib::{
    actuator_client::ActuatorClient,
    cam_client::CamClient,
    colour::{self, HsvColourDetector},
    nav::{self, NavCtrl},
    params::ExecParams,
    power::{self, FileChargeStore, PowerEstimator, SimVoltageSource, VoltageSource},
    shared::{SnapshotCell, TargetColourCell},
    tc_processor::{self, TcContext},
    tc_server::{TcServer, TcServerError},
};
use util::{
    archive::Archiver,
    host,
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    color_eyre::install()?;

    let session =
        Session::new("follower_exec", "sessions").wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Line Follower Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let exec_params: ExecParams =
        util::params::load("follower_exec.toml").wrap_err("Could not load exec params")?;
    exec_params
        .are_valid()
        .wrap_err("Exec parameters are invalid")?;

    let power_params: power::Params =
        util::params::load("power_est.toml").wrap_err("Could not load power params")?;

    let colour_params: colour::Params =
        util::params::load("colour_det.toml").wrap_err("Could not load colour params")?;
    colour_params
        .are_valid()
        .wrap_err("Colour detection parameters are invalid")?;

    info!("Exec parameters loaded");

    // ---- INITIALISE MODULES ----

    let mut nav_ctrl = NavCtrl::default();
    nav_ctrl
        .init("nav_ctrl.toml")
        .wrap_err("Failed to initialise NavCtrl")?;
    info!("NavCtrl init complete");

    let running = Arc::new(AtomicBool::new(true));
    let target_colour = Arc::new(TargetColourCell::new());
    let battery = Arc::new(SnapshotCell::<BatteryTm>::new());
    let (reset_tx, reset_rx) = mpsc::channel();

    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl-C received, stopping");
            running.store(false, Ordering::Relaxed);
        })
        .wrap_err("Failed to set the Ctrl-C handler")?;
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let tc_server = TcServer::new(&zmq_ctx, &exec_params.net.tc_endpoint)
        .wrap_err("Failed to initialise the TcServer")?;
    info!("TcServer bound to {}", exec_params.net.tc_endpoint);

    let nav_actuator = ActuatorClient::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the navigation ActuatorClient")?;
    let nav_cam = CamClient::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the navigation CamClient")?;
    let colour_actuator = ActuatorClient::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the colour ActuatorClient")?;
    let colour_cam = CamClient::new(&zmq_ctx, &exec_params)
        .wrap_err("Failed to initialise the colour CamClient")?;

    info!("Network initialisation complete");

    // ---- START TASKS ----

    let power_handle = start_power_task(
        &session,
        &exec_params,
        power_params,
        battery.clone(),
        reset_rx,
        running.clone(),
    )?;

    let nav_handle = {
        let running = running.clone();
        let period = Duration::from_secs_f64(exec_params.nav_period_s);
        let archiver = archiver(&session, "nav_ctrl/status_report.csv");

        thread::Builder::new()
            .name("nav".into())
            .spawn(move || {
                nav::run_nav_task(nav_ctrl, nav_cam, nav_actuator, period, &running, archiver)
            })
            .wrap_err("Failed to start the navigation task")?
    };

    let colour_handle = {
        let running = running.clone();
        let target_colour = target_colour.clone();
        let period = Duration::from_secs_f64(exec_params.colour_period_s);

        thread::Builder::new()
            .name("colour".into())
            .spawn(move || {
                colour::run_colour_task(
                    colour_params,
                    &target_colour,
                    HsvColourDetector,
                    colour_cam,
                    colour_actuator,
                    period,
                    &running,
                )
            })
            .wrap_err("Failed to start the colour task")?
    };

    // ---- TELECOMMAND LOOP ----

    info!("Begining telecommand processing\n");

    let tc_ctx = TcContext {
        target_colour: &target_colour,
        battery: &battery,
        resets: &reset_tx,
    };

    while running.load(Ordering::Relaxed) {
        match tc_server.receive_tc() {
            Ok(Some(tc)) => {
                let response = tc_processor::exec(&tc_ctx, &tc);

                if let Err(e) = tc_server.send_response(&response) {
                    warn!("Could not respond to TC: {}", e);
                }
            }
            Ok(None) => (),
            Err(TcServerError::TcParseError(e)) => warn!("Could not parse recieved TC: {}", e),
            Err(e) => warn!("TcServer error: {}", e),
        }
    }

    // ---- SHUTDOWN ----

    info!("Stopping tasks");

    for (name, handle) in vec![
        ("navigation", nav_handle),
        ("colour", colour_handle),
        ("power", power_handle),
    ] {
        if handle.join().is_err() {
            warn!("The {} task panicked", name);
        }
    }

    info!("End of execution");
    session.exit();

    Ok(())
}

/// Build the charge store and voltage source and start the power task on its own thread.
fn start_power_task(
    session: &Session,
    exec_params: &ExecParams,
    power_params: power::Params,
    battery: Arc<SnapshotCell<BatteryTm>>,
    resets: Receiver<BatteryReset>,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>, Report> {
    let mut charge_path = host::get_sw_root().wrap_err("Could not find the software root")?;
    charge_path.push(&exec_params.charge_file);
    info!("Battery charge persisted in {:?}", charge_path);

    let store = FileChargeStore::new(charge_path);
    let period = Duration::from_secs_f64(exec_params.power_period_s);
    let archiver = archiver(session, "power/elec_sample.csv");

    #[cfg(target_arch = "arm")]
    {
        if !exec_params.sim_adc {
            let adc = power::Mcp3208::new().wrap_err("Failed to open the ADC")?;
            info!("Using the MCP3208 ADC");
            return spawn_power_task(
                PowerEstimator::new(power_params, adc, store, battery)
                    .wrap_err("Failed to initialise the PowerEstimator")?,
                period,
                resets,
                running,
                archiver,
            );
        }
    }

    info!("Using the simulated ADC");
    let adc = SimVoltageSource::new(&power_params.sim_channel_voltages);

    spawn_power_task(
        PowerEstimator::new(power_params, adc, store, battery)
            .wrap_err("Failed to initialise the PowerEstimator")?,
        period,
        resets,
        running,
        archiver,
    )
}

fn spawn_power_task<V>(
    estimator: PowerEstimator<V, FileChargeStore>,
    period: Duration,
    resets: Receiver<BatteryReset>,
    running: Arc<AtomicBool>,
    archiver: Option<Archiver>,
) -> Result<JoinHandle<()>, Report>
where
    V: VoltageSource + Send + 'static,
{
    thread::Builder::new()
        .name("power".into())
        .spawn(move || power::run_power_task(estimator, period, resets, &running, archiver))
        .wrap_err("Failed to start the power task")
}

/// Open an archive in the session, archiving is skipped if it cannot be opened.
fn archiver(session: &Session, path: &str) -> Option<Archiver> {
    match Archiver::from_path(session, path) {
        Ok(a) => Some(a),
        Err(e) => {
            warn!("Could not open the {} archive, it will not be written: {}", path, e);
            None
        }
    }
}
