/// Input of one blur iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurSource {
    /// Bright output of the HDR lighting target.
    Bright,
    /// One of the two ping-pong colour buffers.
    PingPong(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlurStep {
    pub target: usize,
    pub source: BlurSource,
    pub horizontal: bool,
}

/// Alternating separable Gaussian passes, starting horizontal.
///
/// The horizontal pass writes ping-pong buffer 1 and the vertical pass
/// buffer 0; each pass after the first reads what the previous one wrote.
pub fn blur_schedule(passes: u32) -> Vec<BlurStep> {
    let mut steps = Vec::with_capacity(passes as usize);
    let mut horizontal = true;
    for i in 0..passes {
        let source = if i == 0 {
            BlurSource::Bright
        } else {
            BlurSource::PingPong(usize::from(!horizontal))
        };
        steps.push(BlurStep {
            target: usize::from(horizontal),
            source,
            horizontal,
        });
        horizontal = !horizontal;
    }
    steps
}

/// Buffer holding the blurred result; the bright buffer itself if no pass ran.
pub fn blur_result(steps: &[BlurStep]) -> BlurSource {
    steps
        .last()
        .map_or(BlurSource::Bright, |step| BlurSource::PingPong(step.target))
}
