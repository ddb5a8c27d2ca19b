use altar::{AltarResult, Context, Engine, Error, Loader};
use std::collections::HashMap;

pub fn render(template: &str, context: Context) -> Result<String, altar::Error> {
    Engine::new().render(template, &context)
}

pub fn render_empty(template: &str) -> Result<String, altar::Error> {
    render(template, Context::new())
}

/// An in-memory [`Loader`] for tests that need `extends`/`include`/`import`
/// without touching the filesystem.
pub struct MapLoader(pub HashMap<&'static str, &'static str>);

impl Loader for MapLoader {
    fn load(&self, name: &str) -> AltarResult<String> {
        self.0
            .get(name)
            .map(|s| s.to_string())
            .ok_or_else(|| Error::template_not_found(name))
    }
}

pub fn engine_with(templates: &[(&'static str, &'static str)]) -> Engine {
    let loader = MapLoader(templates.iter().copied().collect());
    Engine::new().set_loader(loader)
}

pub mod control_flow;
pub mod errors;
pub mod expressions;
pub mod filters;
pub mod inheritance;
pub mod lexing;
pub mod macros;
pub mod scenarios;
