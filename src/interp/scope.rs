//! Lexical scopes
//!
//! Frames live in an arena owned by the interpreter and refer to their
//! parent by id. Closures hold a frame id instead of a counted pointer, so
//! dropping the interpreter releases every frame at once.
//!
//! A frame that no closure can reach is recycled once evaluation leaves it.
//! Creating a closure marks its frame and every ancestor as captured, and
//! captured frames stay put until the interpreter drops.

use id_arena::{Arena, Id};
use rustc_hash::FxHashMap;

use super::symbols::Symbol;
use super::value::Value;

pub type FrameId = Id<Frame>;

/// One scope of variable bindings
#[derive(Default)]
pub struct Frame {
    vars: FxHashMap<Symbol, Value>,
    /// `None` for the global frame and for frames on the free list
    parent: Option<FrameId>,
    captured: bool,
}

pub struct Scopes {
    arena: Arena<Frame>,
    global: FrameId,
    free: Vec<FrameId>,
}

impl Scopes {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let global = arena.alloc(Frame {
            captured: true,
            ..Frame::default()
        });
        Self {
            arena,
            global,
            free: Vec::new(),
        }
    }

    /// The global frame
    pub fn global(&self) -> FrameId {
        self.global
    }

    /// Allocate a child frame of `parent`, reusing a released one if any
    pub fn push(&mut self, parent: FrameId) -> FrameId {
        match self.free.pop() {
            Some(id) => {
                let frame = &mut self.arena[id];
                frame.parent = Some(parent);
                frame.captured = false;
                id
            }
            None => self.arena.alloc(Frame {
                vars: FxHashMap::default(),
                parent: Some(parent),
                captured: false,
            }),
        }
    }

    /// Mark `frame` and its ancestors as reachable from a closure
    pub fn capture(&mut self, frame: FrameId) {
        let mut cur = Some(frame);
        while let Some(id) = cur {
            let frame = &mut self.arena[id];
            if frame.captured {
                break;
            }
            frame.captured = true;
            cur = frame.parent;
        }
    }

    /// Drop the bindings of an uncaptured frame and queue it for reuse.
    /// Returns false when the frame has to stay.
    pub fn release(&mut self, id: FrameId) -> bool {
        let frame = &mut self.arena[id];
        if frame.captured || frame.parent.is_none() {
            return false;
        }
        frame.vars.clear();
        frame.parent = None;
        self.free.push(id);
        true
    }

    /// Whether `ancestor` is `frame` or one of its parents
    pub fn encloses(&self, ancestor: FrameId, frame: FrameId) -> bool {
        let mut cur = Some(frame);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.arena[id].parent;
        }
        false
    }

    /// Define (or redefine) a variable in `frame` itself
    pub fn define(&mut self, frame: FrameId, name: Symbol, value: Value) {
        self.arena[frame].vars.insert(name, value);
    }

    /// Look up a variable, walking up the parent chain
    pub fn lookup(&self, frame: FrameId, name: Symbol) -> Option<&Value> {
        let mut cur = Some(frame);
        while let Some(id) = cur {
            let frame = &self.arena[id];
            if let Some(value) = frame.vars.get(&name) {
                return Some(value);
            }
            cur = frame.parent;
        }
        None
    }

    /// Assign to the nearest existing binding. Returns false when unbound.
    pub fn assign(&mut self, frame: FrameId, name: Symbol, value: Value) -> bool {
        let mut cur = Some(frame);
        while let Some(id) = cur {
            let frame = &mut self.arena[id];
            if let Some(slot) = frame.vars.get_mut(&name) {
                *slot = value;
                return true;
            }
            cur = frame.parent;
        }
        false
    }

    /// Number of frames allocated so far, recycled ones included
    pub fn frame_count(&self) -> usize {
        self.arena.len()
    }
}

impl Default for Scopes {
    fn default() -> Self {
        Self::new()
    }
}
