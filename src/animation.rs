use crate::graphics::backend::MorphFrame;

/// A run of consecutive mesh frames played at a fixed rate.
#[derive(Clone, Debug, PartialEq)]
pub struct MorphAnimation {
    pub first_frame: u32,
    pub frame_count: u32,
    pub frame_time: f32,
    pub looping: bool,
}

impl MorphAnimation {
    pub fn new(first_frame: u32, frame_count: u32, frame_time: f32, looping: bool) -> Self {
        Self {
            first_frame,
            frame_count: frame_count.max(1),
            frame_time: frame_time.max(f32::EPSILON),
            looping,
        }
    }

    pub fn duration(&self) -> f32 {
        self.frame_count as f32 * self.frame_time
    }
}

/// Plays one of several [`MorphAnimation`]s over a multi-frame mesh and
/// produces the pair of frames to blend for the current instant.
#[derive(Clone, Debug, Default)]
pub struct MorphAnimator {
    animations: Vec<MorphAnimation>,
    current: usize,
    elapsed: f32,
    done: bool,
}

impl MorphAnimator {
    pub fn new(animations: Vec<MorphAnimation>) -> Self {
        Self {
            animations,
            current: 0,
            elapsed: 0.0,
            done: false,
        }
    }

    /// Idle pose at frame 0 and a seven-frame recoil after it.
    pub fn cannon() -> Self {
        Self::new(vec![
            MorphAnimation::new(0, 1, 1.0, true),
            MorphAnimation::new(1, 7, 0.05, false),
        ])
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Switch to animation `index` from its first frame. Unknown indices are ignored.
    pub fn play(&mut self, index: usize) {
        if index < self.animations.len() {
            self.current = index;
            self.restart();
        }
    }

    pub fn restart(&mut self) {
        self.elapsed = 0.0;
        self.done = false;
    }

    pub fn update(&mut self, dt: f32) {
        let Some(anim) = self.animations.get(self.current) else {
            return;
        };
        if self.done {
            return;
        }
        self.elapsed += dt;
        let duration = anim.duration();
        if self.elapsed >= duration {
            if anim.looping {
                self.elapsed %= duration;
            } else {
                self.elapsed = duration;
                self.done = true;
            }
        }
    }

    pub fn morph(&self) -> MorphFrame {
        let Some(anim) = self.animations.get(self.current) else {
            return MorphFrame::default();
        };
        let last = anim.frame_count - 1;
        let t = self.elapsed / anim.frame_time;
        let local = (t.floor() as u32).min(last);
        let next = if local < last {
            local + 1
        } else if anim.looping {
            0
        } else {
            last
        };
        let blend = if self.done { 0.0 } else { t.fract() };
        MorphFrame {
            frame: anim.first_frame + local,
            next: anim.first_frame + next,
            blend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn one_shot_holds_last_frame_when_done() {
        let mut anim = MorphAnimator::cannon();
        anim.play(1);
        anim.update(0.12);
        let m = anim.morph();
        assert_eq!(m.frame, 3);
        assert_eq!(m.next, 4);
        assert_relative_eq!(m.blend, 0.4, epsilon = 1e-4);

        anim.update(1.0);
        assert!(anim.is_done());
        assert_eq!(anim.morph(), MorphFrame { frame: 7, next: 7, blend: 0.0 });
    }

    #[test]
    fn looping_wraps_to_first_frame() {
        let mut anim = MorphAnimator::new(vec![MorphAnimation::new(2, 2, 0.5, true)]);
        anim.update(0.75);
        let m = anim.morph();
        assert_eq!((m.frame, m.next), (3, 2));
        anim.update(0.5);
        assert!(!anim.is_done());
        assert_eq!(anim.morph().frame, 2);
    }

    #[test]
    fn play_unknown_index_keeps_current() {
        let mut anim = MorphAnimator::cannon();
        anim.play(9);
        assert_eq!(anim.current(), 0);
    }
}
