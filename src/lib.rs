//! # Shutterlapse
//!
//! Scheduled, unattended exposures for Canon cameras over the CCAPI HTTP
//! control protocol. Point it at a camera on the local network and it will
//! press and release the shutter at a fixed cadence until a stop time or
//! Ctrl-C — built for night-sky timelapses where the camera runs for hours
//! with nobody watching.
//!
//! # Architecture
//!
//! One startup pass feeds one long-running loop:
//!
//! ```text
//! discover /ccapi/  →  resolve shutter endpoint  →  read exposure
//!                                                      │
//!                                    validate interval > exposure
//!                                                      │
//!                               scheduler ⟳ actuator press/release
//! ```
//!
//! Discovery, resolution, and validation run once; any failure there aborts
//! before the first shot (exit code 1). After that the scheduler treats
//! every failure as survivable: a failed cycle is counted, recovery runs,
//! and the loop continues.
//!
//! The event monitor is a separate mode with its own loop; it never shares
//! actuator state with the scheduler.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`client`] | Blocking HTTPS transport — self-signed certs accepted, short/long timeouts |
//! | [`capability`] | Capability index parsing and shutter endpoint resolution |
//! | [`exposure`] | Shutter-speed reading and interval validation |
//! | [`shutter`] | Press/release state machine with stuck-shutter recovery |
//! | [`schedule`] | Fixed-cadence shot loop with deadline and cancellable sleeps |
//! | [`monitor`] | Long-poll loop over the camera's event feed |
//! | [`cancel`] | Ctrl-C token; turns sleeps into cancellable waits |
//!
//! # Design Decisions
//!
//! ## Blocking HTTP, One Logical Thread Per Loop
//!
//! Every network call blocks with an explicit timeout: ~5 s for actions and
//! settings, 35 s for the event long poll. The scheduler and the monitor are
//! each a single thread of control, which keeps the shutter state machine
//! trivially non-reentrant — the only mutable shared thing in a session is
//! the shutter state, and exactly one actuator owns it.
//!
//! ## Recovery As An Ordered Variant List
//!
//! Cameras differ in which release payload they accept once the button is
//! stuck. Rather than branch per firmware, recovery walks an ordered list of
//! candidate bodies and stops at the first accepted response. A fully stuck
//! shutter is logged loudly but never crashes the run: every subsequent
//! cycle retries recovery before pressing again.
//!
//! ## Trait Seams For The Wire
//!
//! [`shutter::ShutterTransport`] and [`monitor::EventSource`] are the only
//! places the state machines touch HTTP. Production wires them to
//! [`client::CameraClient`]; tests script fakes, so every state transition
//! and retry order is unit-tested without a camera.

pub mod cancel;
pub mod capability;
pub mod client;
pub mod exposure;
pub mod monitor;
pub mod schedule;
pub mod shutter;
