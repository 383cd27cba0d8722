use log::info;

use crate::engine::Engine;
use crate::error::TitanError;

/// What the screen stack should do after the top screen's update.
pub enum ScreenAction {
    None,
    /// Put a screen on top. The current one stops updating but stays resident.
    Push(Box<dyn Screen>),
    Pop,
    Switch(Box<dyn Screen>),
    ReplaceAll(Box<dyn Screen>),
    Quit,
}

/// One state of the application's screen flow.
///
/// Only the top screen is updated. Drawing starts at the topmost opaque
/// screen, so transparent overlays render over whatever is beneath them.
/// Leaving the stack only stops the calls: GPU resources a screen owns are
/// released in [`on_exit`](Screen::on_exit).
pub trait Screen {
    fn name(&self) -> &'static str;
    fn on_enter(&mut self, _engine: &mut Engine) -> Result<(), TitanError> { Ok(()) }
    fn on_exit(&mut self, _engine: &mut Engine) {}
    /// The screen above this one was popped.
    fn on_resume(&mut self, _engine: &mut Engine) {}
    fn update(&mut self, engine: &mut Engine) -> ScreenAction;
    fn draw(&mut self, engine: &mut Engine);
    fn resize(&mut self, _engine: &mut Engine, _width: u32, _height: u32) -> Result<(), TitanError> { Ok(()) }
    fn is_transparent(&self) -> bool { false }
}

pub struct ScreenStack {
    screens: Vec<Box<dyn Screen>>,
    initialized: bool,
}

impl ScreenStack {
    pub fn new(initial: Box<dyn Screen>) -> Self {
        Self { screens: vec![initial], initialized: false }
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// Name of the screen currently receiving updates.
    pub fn top(&self) -> Option<&'static str> {
        self.screens.last().map(|s| s.name())
    }

    fn enter(&mut self, engine: &mut Engine, mut screen: Box<dyn Screen>) -> Result<(), TitanError> {
        info!("entering screen '{}'", screen.name());
        screen.on_enter(engine)?;
        self.screens.push(screen);
        Ok(())
    }

    fn exit_top(&mut self, engine: &mut Engine) -> bool {
        match self.screens.pop() {
            Some(mut top) => {
                info!("leaving screen '{}'", top.name());
                top.on_exit(engine);
                true
            }
            None => false,
        }
    }

    /// Run the first screen's `on_enter` once, then update the top screen
    /// and apply the transition it asks for.
    pub fn update(&mut self, engine: &mut Engine) -> Result<(), TitanError> {
        if !self.initialized {
            self.initialized = true;
            if let Some(first) = self.screens.pop() {
                self.enter(engine, first)?;
            }
        }

        let action = match self.screens.last_mut() {
            Some(top) => top.update(engine),
            None => return Ok(()),
        };

        match action {
            ScreenAction::None => {}
            ScreenAction::Push(s) => self.enter(engine, s)?,
            ScreenAction::Pop => {
                self.exit_top(engine);
                if let Some(top) = self.screens.last_mut() {
                    top.on_resume(engine);
                }
            }
            ScreenAction::Switch(s) => {
                self.exit_top(engine);
                self.enter(engine, s)?;
            }
            ScreenAction::ReplaceAll(s) => {
                while self.exit_top(engine) {}
                self.enter(engine, s)?;
            }
            ScreenAction::Quit => engine.request_quit(),
        }
        if self.screens.is_empty() {
            engine.request_quit();
        }
        Ok(())
    }

    pub fn draw(&mut self, engine: &mut Engine) {
        let start = self.screens.iter().rposition(|s| !s.is_transparent()).unwrap_or(0);
        for screen in &mut self.screens[start..] {
            screen.draw(engine);
        }
    }

    pub fn resize(&mut self, engine: &mut Engine, width: u32, height: u32) -> Result<(), TitanError> {
        for screen in &mut self.screens {
            screen.resize(engine, width, height)?;
        }
        Ok(())
    }

    /// Exit every screen, top first.
    pub fn shutdown(&mut self, engine: &mut Engine) {
        while self.exit_top(engine) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TitanConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<String>>>;

    struct Probe {
        name: &'static str,
        log: Log,
        next: Option<ScreenAction>,
        transparent: bool,
    }

    impl Probe {
        fn boxed(name: &'static str, log: &Log, next: Option<ScreenAction>, transparent: bool) -> Box<dyn Screen> {
            Box::new(Self { name, log: log.clone(), next, transparent })
        }
    }

    impl Screen for Probe {
        fn name(&self) -> &'static str { self.name }
        fn on_enter(&mut self, _: &mut Engine) -> Result<(), TitanError> {
            self.log.borrow_mut().push(format!("enter {}", self.name));
            Ok(())
        }
        fn on_exit(&mut self, _: &mut Engine) {
            self.log.borrow_mut().push(format!("exit {}", self.name));
        }
        fn on_resume(&mut self, _: &mut Engine) {
            self.log.borrow_mut().push(format!("resume {}", self.name));
        }
        fn update(&mut self, _: &mut Engine) -> ScreenAction {
            self.next.take().unwrap_or(ScreenAction::None)
        }
        fn draw(&mut self, _: &mut Engine) {
            self.log.borrow_mut().push(format!("draw {}", self.name));
        }
        fn is_transparent(&self) -> bool { self.transparent }
    }

    #[test]
    fn overlay_draws_over_the_screen_below_and_pop_resumes_it() {
        let log: Log = Rc::default();
        let overlay = Probe::boxed("pause", &log, Some(ScreenAction::Pop), true);
        let mut stack = ScreenStack::new(Probe::boxed("game", &log, Some(ScreenAction::Push(overlay)), false));
        let mut engine = Engine::headless(TitanConfig::default());

        stack.update(&mut engine).unwrap();
        assert_eq!(stack.top(), Some("pause"));
        stack.draw(&mut engine);
        stack.update(&mut engine).unwrap();
        assert_eq!(stack.top(), Some("game"));

        assert_eq!(
            *log.borrow(),
            ["enter game", "enter pause", "draw game", "draw pause", "exit pause", "resume game"]
        );
    }

    #[test]
    fn replace_all_exits_everything_and_quit_when_empty() {
        let log: Log = Rc::default();
        let menu = Probe::boxed("menu", &log, Some(ScreenAction::Pop), false);
        let mut stack = ScreenStack::new(Probe::boxed("splash", &log, Some(ScreenAction::ReplaceAll(menu)), false));
        let mut engine = Engine::headless(TitanConfig::default());

        stack.update(&mut engine).unwrap();
        assert_eq!(stack.top(), Some("menu"));
        assert!(!engine.quit_requested());
        stack.update(&mut engine).unwrap();
        assert!(stack.is_empty());
        assert!(engine.quit_requested());
    }
}
