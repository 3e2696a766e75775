use std::{path::Path, time::Duration};

use console::style;
use indicatif::HumanDuration;
use tessera_postfx::StepDesc;

const LABEL_WIDTH: usize = 12;

pub fn status(label: &str, message: impl AsRef<str>) {
    eprintln!(
        "{:>width$} {}",
        style(label).green().bold(),
        message.as_ref(),
        width = LABEL_WIDTH
    );
}

pub fn warn(message: impl AsRef<str>) {
    eprintln!("{}: {}", style("warning").yellow().bold(), message.as_ref());
}

pub fn error(message: impl AsRef<str>) {
    eprintln!("{}: {}", style("error").red().bold(), message.as_ref());
}

/// Prints `name = effect(inputs)` under the preceding status line.
pub fn chain_step(step: &StepDesc) {
    eprintln!("{:>width$} {}", "", describe_step(step), width = LABEL_WIDTH);
}

fn describe_step(step: &StepDesc) -> String {
    let inputs = match &step.input2 {
        Some(input2) => format!("{}, {input2}", step.input),
        None => step.input.clone(),
    };
    format!(
        "{} = {}({})",
        style(&step.name).bold(),
        style(step.effect).cyan(),
        style(inputs).dim()
    )
}

pub fn finished(path: &Path, (width, height): (u32, u32), elapsed: Duration) {
    status(
        "Finished",
        format!(
            "{} ({width}x{height}) in {}",
            path.display(),
            HumanDuration(elapsed)
        ),
    );
}

#[cfg(test)]
mod tests {
    use tessera_postfx::{BasicEffect, DualEffect};

    use super::*;

    #[test]
    fn steps_read_as_assignments() {
        console::set_colors_enabled_stderr(false);
        console::set_colors_enabled(false);

        let blur = StepDesc::new("blur", BasicEffect::GaussianBlur5x5);
        assert_eq!(describe_step(&blur), "blur = gaussian_blur_5x5(source)");

        let mix = StepDesc::new("mix", DualEffect::Merge).input2("blur");
        assert_eq!(describe_step(&mix), "mix = merge(source, blur)");
    }
}
