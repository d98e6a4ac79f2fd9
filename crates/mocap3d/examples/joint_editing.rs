//! Hiding an unreliable joint in one camera before reconstructing.
//!
//! Run with: `RUST_LOG=info cargo run -p mocap3d --example joint_editing`

use anyhow::{Result, bail};
use mocap3d::prelude::*;
use mocap3d::synthetic::{RingRigSpec, observe, ring_rig, skeleton_tracks};
use mocap3d::{NoopReporter, ObservationEditor};

fn main() -> Result<()> {
    env_logger::init();

    let rig = ring_rig(&RingRigSpec::default())?;
    let truth = skeleton_tracks(10, 33, 400.0, 5);
    let mut observations = observe(&rig, &truth);
    // joint 12 drifts badly in camera 0
    for frame in 0..10 {
        observations[[0, frame, 12, 0]] += 80.0 + 10.0 * frame as f64;
    }

    let mut editor = ObservationEditor::new(observations);
    println!("camera 0, frame 3, joint 12 before: {}", editor.joints(0, 3)?.row(12));
    editor.remove_joint(0, 12)?;
    println!("camera 0, frame 3, joint 12 after:  {}", editor.joints(0, 3)?.row(12));

    let Completion::Completed(output) = reconstruct(
        &editor.to_observations(),
        &rig,
        &ReconstructionConfig::default(),
        FrameRange::all(),
        &mut NoopReporter,
        &CancelToken::new(),
    )?
    else {
        bail!("reconstruction cancelled");
    };
    let err = output.reprojection_errors.column(12);
    log::info!("joint 12 reprojection error per frame: {err}");
    println!("outcome: {:?}", output.report.outcome);

    editor.reinstate_joint(0, 12)?;
    println!("joint 12 restored: {}", !editor.is_removed(0, 12));
    Ok(())
}
