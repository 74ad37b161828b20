/// Splits an optional pair into a pair of options, so that a reading that
/// produces both directions at once can feed two independent fields.
pub trait DestructureTupleExt<A, B> {
    fn destructure(self) -> (Option<A>, Option<B>);
}

impl<A, B> DestructureTupleExt<A, B> for Option<(A, B)> {
    fn destructure(self) -> (Option<A>, Option<B>) {
        match self {
            Some((a, b)) => (Some(a), Some(b)),
            None => (None, None),
        }
    }
}

/// A failed reading counts as "unknown" for both halves; log the error first.
impl<A, B, E> DestructureTupleExt<A, B> for Result<Option<(A, B)>, E> {
    fn destructure(self) -> (Option<A>, Option<B>) {
        self.ok().flatten().destructure()
    }
}
