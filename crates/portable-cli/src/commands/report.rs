use portable_build::TarballOutcome;
use portable_core::Dver;

/// What happened across all (bundle, dver) runs.
#[derive(Debug, Default)]
pub struct Report {
    written: Vec<TarballOutcome>,
    failed: Vec<(String, Dver)>,
}

impl Report {
    pub fn written(&mut self, outcome: TarballOutcome) {
        println!(
            "Tarball created as {}, size {} bytes, {} files",
            outcome.path.display(),
            group_thousands(outcome.size),
            file_count(&outcome)
        );
        self.written.push(outcome);
    }

    pub fn failed(&mut self, bundle: &str, dver: Dver) {
        self.failed.push((bundle.to_owned(), dver));
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn print(&self) {
        if !self.written.is_empty() {
            println!("The following tarballs were written:");
            for outcome in &self.written {
                println!(
                    "     path: {:<50} size: {:>12} bytes {:>6} files",
                    outcome.path.display().to_string(),
                    group_thousands(outcome.size),
                    file_count(outcome)
                );
            }
        }

        if !self.failed.is_empty() {
            println!("The following sets of parameters failed:");
            for (bundle, dver) in &self.failed {
                println!("    bundle: {bundle:<20} dver: {:>3}", dver.as_str());
            }
        }
    }
}

fn file_count(outcome: &TarballOutcome) -> String {
    outcome
        .file_count
        .map(|n| group_thousands(n as u64))
        // arch-lint: allow(no-silent-result-drop) reason="a failed count was already logged; the summary shows ?"
        .unwrap_or_else(|| "?".to_owned())
}

/// `1234567` → `1,234,567`
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
