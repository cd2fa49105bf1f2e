//! Mission worker thread.
//!
//! The supervisor runs on one dedicated thread and is the only writer of
//! phase and slot state. Producers publish into the shared [`BridgeState`];
//! the owner can ask the worker to stop between polls.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use robobot_mission_core::supervisor::{
    MissionInputs, MissionReport, MissionSupervisor, SupervisorEvent,
};

use crate::clock::WallClock;
use crate::config::MissionConfig;
use crate::core::mission_log::MissionLog;
use crate::error::RuntimeError;
use crate::link::{BridgeState, TextLink};
use crate::notifier::LogNotifier;
use crate::{log_error, log_info, log_warn};

/// Handle to a running mission.
pub struct MissionRuntime {
    handle: JoinHandle<Result<MissionReport, RuntimeError>>,
    stop: Arc<AtomicBool>,
}

impl MissionRuntime {
    /// Validate `config` and start the mission on a worker named `mission`.
    pub fn spawn<W>(
        config: MissionConfig,
        state: Arc<BridgeState>,
        link: W,
    ) -> Result<Self, RuntimeError>
    where
        W: Write + Send + 'static,
    {
        config.validate()?;
        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name("mission".into())
            .spawn(move || {
                let result = run_mission(&config, &state, link, &worker_stop);
                if let Err(e) = &result {
                    log_error!("mission aborted: {}", e);
                }
                result
            })?;

        Ok(Self { handle, stop })
    }

    /// Ask the worker to finish after the current poll.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return its report.
    pub fn join(self) -> Result<MissionReport, RuntimeError> {
        self.handle.join().map_err(|_| RuntimeError::WorkerPanic)?
    }
}

fn run_mission<W: Write>(
    config: &MissionConfig,
    state: &BridgeState,
    link: W,
    stop: &AtomicBool,
) -> Result<MissionReport, RuntimeError> {
    let notifier = LogNotifier::new();
    let inputs = MissionInputs {
        events: state,
        heartbeat: state,
        perception: state,
        manual: state,
        notifier: &notifier,
    };

    let mut mission_log = match &config.log.mission_log_dir {
        Some(dir) => {
            let (log, path) = MissionLog::create(
                dir,
                config.supervisor.first_phase,
                config.supervisor.last_phase,
            )?;
            log_info!("mission log: {}", path.display());
            Some(log)
        }
        None => None,
    };

    let registry = config.build_registry();
    log_info!(phases = ?registry.list(), "mission configured");

    let mut supervisor = MissionSupervisor::new(
        TextLink::new(link),
        WallClock::new(),
        config.supervisor_config()?,
        config.slot_config()?,
        registry,
        inputs,
    );

    supervisor.initialize()?;
    log_info!("controller alive, waiting for go event {}", config.supervisor.operator_go_event);

    let report = supervisor.run(
        |event| {
            log_event(event);
            let log = mission_log.as_mut();
            if let (Some(log), SupervisorEvent::Transition { at_ms, from, to }) = (log, event) {
                if let Err(e) = log.record(*at_ms, *from, *to) {
                    log_warn!("mission log write failed: {}", e);
                }
            }
        },
        || stop.load(Ordering::Acquire),
    )?;

    log_info!(
        polls = report.polls,
        submissions = report.submissions,
        overflows = report.overflows,
        "mission finished after {} ms",
        report.elapsed_ms
    );
    Ok(report)
}

fn log_event(event: &SupervisorEvent) {
    match event {
        SupervisorEvent::Started { .. } => log_info!("operator go received"),
        SupervisorEvent::Transition { from, to, .. } => log_info!("{} -> {}", from, to),
        SupervisorEvent::SnippetArmed { slot, lines } => {
            log_info!("armed slot {:?} with {} lines", slot, lines)
        }
        SupervisorEvent::CapacityExceeded { phase, dropped } => {
            log_warn!("phase {} snippet truncated, {} lines dropped", phase, dropped)
        }
        SupervisorEvent::ManualOverride { active: true } => {
            log_info!("manual override, mission paused")
        }
        SupervisorEvent::ManualOverride { active: false } => log_info!("manual override released"),
        SupervisorEvent::PhaseFault {
            phase,
            error,
            fallback,
        } => log_warn!("phase {} failed: {}, continuing in state {}", phase, error, fallback),
        SupervisorEvent::DisplayFailed { row, error } => {
            log_warn!("display row {} not updated: {}", *row as u8, error)
        }
        SupervisorEvent::Finished { reason } => log_info!("mission finished: {}", reason),
    }
}
