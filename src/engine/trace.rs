//! Ambient "logging": an enabled-flag-gated `eprintln!` tracer, grounded on
//! the teacher's `pipeline::debug::DebugContext` (same `enabled` guard on
//! every method, same banner-style formatting). No logging crate appears
//! anywhere in the example pack this project descends from, so none is
//! introduced here either -- this tracer *is* Altar's logging story.

pub struct RenderTrace {
    enabled: bool,
}

impl RenderTrace {
    pub fn new(enabled: bool) -> Self {
        RenderTrace { enabled }
    }

    pub fn disabled() -> Self {
        RenderTrace { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn print_enter_template(&self, name: &str) {
        if !self.enabled {
            return;
        }
        eprintln!("=== altar: rendering '{name}' ===");
    }

    pub fn print_block_resolution(&self, block: &str, depth: usize) {
        if !self.enabled {
            return;
        }
        eprintln!("--- block '{block}' resolved at inheritance depth {depth}");
    }

    pub fn print_filter_call(&self, name: &str, input_type: &str) {
        if !self.enabled {
            return;
        }
        eprintln!("  | filter '{name}' applied to {input_type}");
    }

    pub fn print_include(&self, name: &str, found: bool) {
        if !self.enabled {
            return;
        }
        if found {
            eprintln!("  > include '{name}' resolved");
        } else {
            eprintln!("  > include '{name}' missing");
        }
    }

    pub fn print_render_result(&self, name: &str, output_len: usize) {
        if !self.enabled {
            return;
        }
        eprintln!("=== altar: '{name}' produced {output_len} bytes ===");
    }
}

impl Default for RenderTrace {
    fn default() -> Self {
        RenderTrace::disabled()
    }
}
