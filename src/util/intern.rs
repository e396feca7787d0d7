use std::{collections::HashMap, fmt, num::NonZeroU32, rc::Rc};

/// Identifiers longer than this many bytes are truncated when interned.
pub const MAX_NAME_LEN: usize = 32;

/// A handle to an interned identifier. To retrieve the `&str`, use
/// [`Interner::get`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(NonZeroU32);

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", self.0)
    }
}

#[derive(Default)]
pub struct Interner {
    map: HashMap<Rc<str>, Name>,
    vec: Vec<Rc<str>>,
}

impl fmt::Debug for Interner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.vec).finish()
    }
}

impl Interner {
    pub fn with_capacity(capacity: usize) -> Self {
        Interner {
            map: HashMap::with_capacity(capacity),
            vec: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.vec.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    /// Interns the identifier, keeping at most [`MAX_NAME_LEN`] bytes of it.
    /// The cut never splits a character.
    pub fn intern(&mut self, name: &str) -> Name {
        let name = truncate(name);
        if let Some(handle) = self.map.get(name) {
            return *handle;
        }
        let len = u32::try_from(self.vec.len()).expect("interner out of capacity");
        let handle = Name(NonZeroU32::MIN.saturating_add(len));
        let key: Rc<str> = name.into();
        self.vec.push(Rc::clone(&key));
        self.map.insert(key, handle);
        handle
    }

    /// Returns the identifier for the provided handle. Panics if the handle
    /// belongs to another interner.
    pub fn get(&self, name: Name) -> &str {
        &self.vec[(name.0.get() - 1) as usize]
    }
}

fn truncate(name: &str) -> &str {
    if name.len() <= MAX_NAME_LEN {
        return name;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
