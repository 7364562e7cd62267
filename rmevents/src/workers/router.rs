/// Maps correlation ids onto handlers.
///
/// Every fragment of one event must reach the same handler, so routing only looks at the
/// correlation id. Consecutive ids land on consecutive handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerRouter {
    handlers: usize,
}

impl HandlerRouter {
    pub fn new(handlers: usize) -> Self {
        debug_assert!(handlers > 0);
        Self {
            handlers: handlers.max(1),
        }
    }

    pub fn handlers(&self) -> usize {
        self.handlers
    }

    pub fn route(&self, correlation_id: i32) -> usize {
        i64::from(correlation_id).rem_euclid(self.handlers as i64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_by_modulo() {
        let router = HandlerRouter::new(4);

        assert_eq!(router.route(0), 0);
        assert_eq!(router.route(5), 1);
        assert_eq!(router.route(42), 2);
        assert!((0..1000).all(|id| router.route(id) < 4));
    }

    #[test]
    fn single_handler_gets_everything() {
        let router = HandlerRouter::new(1);

        assert_eq!(router.route(i32::MAX), 0);
    }
}
