use std::io::{self, Write};

use tilepyr::TileProgress;

/// Terminal progress bar: `0...10...20...` up to `100`, one mark per 2.5%.
pub struct DotProgress<W: Write> {
    out: W,
    /// Next mark to print, in tenths of a percent.
    next: u32,
}

const STEP: u32 = 25;

impl<W: Write> DotProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out, next: 0 }
    }

    pub fn update(&mut self, progress: TileProgress) -> io::Result<()> {
        let reached = (progress.percent() * 10.0).ceil() as u32;
        let mut wrote = false;

        while self.next <= reached.min(1000) {
            if self.next % 100 == 0 {
                write!(self.out, "{}", self.next / 10)?;
            } else {
                self.out.write_all(b".")?;
            }
            self.next += STEP;
            wrote = true;
        }

        if wrote {
            self.out.flush()?;
        }
        Ok(())
    }

    /// Terminate the bar line.
    pub fn finish(mut self) -> io::Result<W> {
        if self.next > 0 {
            writeln!(self.out)?;
        }
        Ok(self.out)
    }
}
