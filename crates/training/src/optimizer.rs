use candle_nn::Optimizer;

use crate::{Result, TrainingError};

/// Sets the learning rate used by `optimizer` from its next step on.
///
/// candle optimizers carry a single parameter group, so the new rate applies
/// to every parameter they own.
pub fn adjust_learning_rate<O: Optimizer>(optimizer: &mut O, lr: f64) -> Result<()> {
    if !lr.is_finite() || lr < 0.0 {
        return Err(TrainingError::invalid_argument(format!(
            "learning rate must be finite and >= 0 (got {})",
            lr
        )));
    }
    log::debug!(
        "adjusting learning rate {:.5e} -> {:.5e}",
        optimizer.learning_rate(),
        lr
    );
    optimizer.set_learning_rate(lr);
    Ok(())
}
