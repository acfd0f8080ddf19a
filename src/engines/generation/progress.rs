use super::evolution_engine::{GenerationStats, ProgressCallback};
use std::sync::mpsc::Sender;

/// Reports progress through the `log` facade
pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::debug!("Generation {} starting...", generation);
    }

    fn on_generation_complete(&mut self, stats: &GenerationStats, hall_of_fame_size: usize) {
        log::info!(
            "Generation {} complete. Best fitness: {:.4} ({}), Hall of Fame size: {}",
            stats.generation,
            stats.best_fitness,
            stats.best_formula,
            hall_of_fame_size
        );
    }

    fn on_individual_evaluated(&mut self, current: usize, total: usize) {
        if current % 10 == 0 || current == total {
            log::trace!("  Evaluated {}/{} individuals", current, total);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressMessage {
    GenerationStart(usize),
    GenerationComplete { stats: GenerationStats, hall_of_fame_size: usize },
    IndividualEvaluated { current: usize, total: usize },
}

/// Forwards progress events to another thread
pub struct ChannelProgressCallback {
    sender: Sender<ProgressMessage>,
}

impl ChannelProgressCallback {
    pub fn new(sender: Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

// A dropped receiver only means nobody is listening any more.
impl ProgressCallback for ChannelProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationStart(generation));
    }

    fn on_generation_complete(&mut self, stats: &GenerationStats, hall_of_fame_size: usize) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete {
            stats: stats.clone(),
            hall_of_fame_size,
        });
    }

    fn on_individual_evaluated(&mut self, current: usize, total: usize) {
        let _ = self.sender.send(ProgressMessage::IndividualEvaluated { current, total });
    }
}
