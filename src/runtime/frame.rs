use std::rc::Rc;

use crate::bytecode::op::Instructions;
use crate::lang::value::Closure;
use crate::runtime::runtime_error::RuntimeError;

/// An active function call.
///
/// `ip` starts at -1 so the dispatch loop's increment lands on the first
/// byte. `frame_pointer` is the stack index where this call's locals
/// begin; arguments already sit in the first `param_count` of those slots
/// when the frame is pushed.
#[derive(Debug)]
pub struct Frame {
    closure: Rc<Closure>,
    pub ip: isize,
    pub frame_pointer: usize,
}

impl Frame {
    pub fn new(closure: Rc<Closure>, frame_pointer: usize) -> Self {
        Frame {
            closure,
            ip: -1,
            frame_pointer,
        }
    }

    pub fn instructions(&self) -> &Instructions {
        &self.closure.func.instructions
    }

    pub fn closure(&self) -> &Rc<Closure> {
        &self.closure
    }
}

/// Fixed-capacity stack of call frames.
///
/// The main frame is pushed at construction and never popped while the
/// machine runs, so `current` is always valid.
#[derive(Debug)]
pub struct Frames {
    frames: Vec<Frame>,
    capacity: usize,
}

impl Frames {
    pub fn new(main: Frame, capacity: usize) -> Self {
        let mut frames = Vec::with_capacity(capacity.min(64));
        frames.push(main);
        Frames { frames, capacity }
    }

    pub fn current(&self) -> &Frame {
        &self.frames[self.frames.len() - 1]
    }

    pub fn current_mut(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    pub fn push(&mut self, frame: Frame) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.capacity {
            return Err(RuntimeError::FrameOverflow);
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::value::CompiledFunction;

    fn closure(instructions: Instructions) -> Rc<Closure> {
        Rc::new(Closure {
            func: Rc::new(CompiledFunction {
                instructions,
                local_count: 0,
                param_count: 0,
            }),
            free: Vec::new(),
        })
    }

    #[test]
    fn test_new_frame_starts_before_the_first_instruction() {
        let frame = Frame::new(closure(vec![1, 2, 3]), 5);
        assert_eq!(frame.ip, -1);
        assert_eq!(frame.frame_pointer, 5);
        assert_eq!(frame.instructions(), &vec![1, 2, 3]);
    }

    #[test]
    fn test_push_beyond_capacity_overflows() {
        let mut frames = Frames::new(Frame::new(closure(vec![]), 0), 2);
        frames.push(Frame::new(closure(vec![]), 0)).unwrap();

        let err = frames.push(Frame::new(closure(vec![]), 0)).unwrap_err();
        assert_eq!(err, RuntimeError::FrameOverflow);
    }

    #[test]
    fn test_current_tracks_pushes_and_pops() {
        let mut frames = Frames::new(Frame::new(closure(vec![9]), 0), 4);
        frames.push(Frame::new(closure(vec![7]), 3)).unwrap();

        assert_eq!(frames.current().frame_pointer, 3);
        frames.pop();
        assert_eq!(frames.current().instructions(), &vec![9]);
    }
}
