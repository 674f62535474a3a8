/// A GPU resource that may not be usable yet.
#[derive(Debug)]
pub enum RenderResource<T> {
    Ready(T),
    Pending,
    Failed(String),
}

impl<T> Default for RenderResource<T> {
    fn default() -> Self {
        RenderResource::Pending
    }
}

impl<T> RenderResource<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            RenderResource::Ready(v) => Some(v),
            RenderResource::Pending | RenderResource::Failed(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, RenderResource::Ready(_))
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for RenderResource<T> {
    fn from(r: Result<T, E>) -> Self {
        match r {
            Ok(v) => RenderResource::Ready(v),
            Err(e) => RenderResource::Failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_distinguished() {
        let pending: RenderResource<u8> = RenderResource::default();
        assert!(pending.ready().is_none() && !pending.is_ready());

        let ok: RenderResource<u8> = Ok::<_, String>(3).into();
        assert_eq!(ok.ready(), Some(&3));

        let failed: RenderResource<u8> = Err::<u8, _>("too large").into();
        assert!(failed.ready().is_none());
        assert!(matches!(failed, RenderResource::Failed(ref s) if s == "too large"));
    }
}
