use serde::{Deserialize, Serialize};

///
/// Pair
///
/// Two-component result row. Closures build one with a two-element tuple
/// and read it back through `getOne`/`getTwo`; rendered queries flatten it
/// into two projected columns.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Pair<A, B> {
    one: A,
    two: B,
}

impl<A, B> Pair<A, B> {
    #[must_use]
    pub const fn new(one: A, two: B) -> Self {
        Self { one, two }
    }

    #[must_use]
    pub const fn one(&self) -> &A {
        &self.one
    }

    #[must_use]
    pub const fn two(&self) -> &B {
        &self.two
    }

    #[must_use]
    pub fn into_parts(self) -> (A, B) {
        (self.one, self.two)
    }
}

impl<A: Clone, B> Pair<A, B> {
    /// Pair `one` with every element of `twos`, keeping their order.
    #[must_use]
    pub fn pair_collection(one: &A, twos: impl IntoIterator<Item = B>) -> Vec<Self> {
        twos.into_iter()
            .map(|two| Self::new(one.clone(), two))
            .collect()
    }
}

impl<A, B> From<(A, B)> for Pair<A, B> {
    fn from((one, two): (A, B)) -> Self {
        Self::new(one, two)
    }
}

///
/// Tuple3
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Tuple3<A, B, C> {
    one: A,
    two: B,
    three: C,
}

impl<A, B, C> Tuple3<A, B, C> {
    #[must_use]
    pub const fn new(one: A, two: B, three: C) -> Self {
        Self { one, two, three }
    }

    #[must_use]
    pub const fn one(&self) -> &A {
        &self.one
    }

    #[must_use]
    pub const fn two(&self) -> &B {
        &self.two
    }

    #[must_use]
    pub const fn three(&self) -> &C {
        &self.three
    }
}
