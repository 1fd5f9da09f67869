//! # Lexical Scopes
//!
//! Local variable names live in a tree of lexical scopes per method. A local
//! is found by walking the tree depth-first from the root: a scope's own
//! locals come before its children, and children are visited in order.
//!
//! The first local in a scope whose slot matches decides that scope. If the
//! live frame cannot produce its value, the scope fails as a whole (its
//! children are not searched) and the walk continues with the next sibling.

use smallvec::SmallVec;

/// A local variable declared in a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeLocal
{
    /// Slot index in the method's local signature; `None` when the reader
    /// could not tell
    pub slot: Option<u32>,
    /// Declared name; `None` when the reader could not produce it
    pub name: Option<String>,
}

impl ScopeLocal
{
    /// Local `name` in `slot`.
    pub fn new(slot: u32, name: impl Into<String>) -> Self
    {
        Self {
            slot: Some(slot),
            name: Some(name.into()),
        }
    }
}

/// One lexical scope and its nested scopes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalScope
{
    /// Locals declared directly in this scope
    pub locals: Vec<ScopeLocal>,
    /// Nested scopes, in declaration order
    pub children: Vec<LexicalScope>,
}

/// Name used for a local whose declared name is unavailable.
pub fn synthesized_local_name(index: u32) -> String
{
    format!("local_{index}")
}

/// Find local `index` below `root` and fetch its live value.
///
/// Returns the local's name (or the synthesized one) together with the value
/// produced by `fetch`.
pub fn find_local<V>(root: &LexicalScope, index: u32, mut fetch: impl FnMut(u32) -> Option<V>) -> Option<(String, V)>
{
    let mut stack: SmallVec<[&LexicalScope; 16]> = SmallVec::new();
    stack.push(root);

    while let Some(scope) = stack.pop() {
        if let Some(local) = scope.locals.iter().find(|local| local.slot == Some(index)) {
            let name = local
                .name
                .clone()
                .unwrap_or_else(|| synthesized_local_name(index));
            if let Some(value) = fetch(index) {
                return Some((name, value));
            }
            continue;
        }
        stack.extend(scope.children.iter().rev());
    }

    None
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn scope(locals: Vec<ScopeLocal>, children: Vec<LexicalScope>) -> LexicalScope
    {
        LexicalScope { locals, children }
    }

    #[test]
    fn test_local_in_root()
    {
        let root = scope(vec![ScopeLocal::new(0, "a"), ScopeLocal::new(1, "b")], vec![]);
        assert_eq!(find_local(&root, 1, |slot| Some(slot * 10)), Some(("b".to_string(), 10)));
    }

    #[test]
    fn test_children_searched_in_order()
    {
        let root = scope(
            vec![ScopeLocal::new(0, "a")],
            vec![
                scope(vec![], vec![scope(vec![ScopeLocal::new(2, "deep")], vec![])]),
                scope(vec![ScopeLocal::new(2, "later")], vec![]),
            ],
        );
        assert_eq!(find_local(&root, 2, Some).map(|(name, _)| name), Some("deep".to_string()));
    }

    #[test]
    fn test_failed_value_moves_to_next_sibling()
    {
        let root = scope(
            vec![],
            vec![
                scope(
                    vec![ScopeLocal::new(3, "first")],
                    vec![scope(vec![ScopeLocal::new(3, "nested")], vec![])],
                ),
                scope(vec![ScopeLocal::new(3, "second")], vec![]),
            ],
        );

        let mut calls = 0;
        let found = find_local(&root, 3, |slot| {
            calls += 1;
            (calls > 1).then_some(slot)
        });
        assert_eq!(found, Some(("second".to_string(), 3)));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_unnamed_local_gets_synthesized_name()
    {
        let root = scope(
            vec![ScopeLocal {
                slot: Some(4),
                name: None,
            }],
            vec![],
        );
        assert_eq!(find_local(&root, 4, |_| Some(())), Some(("local_4".to_string(), ())));
    }

    #[test]
    fn test_missing_local()
    {
        let root = scope(
            vec![ScopeLocal {
                slot: None,
                name: Some("unknown".to_string()),
            }],
            vec![scope(vec![ScopeLocal::new(1, "x")], vec![])],
        );
        assert_eq!(find_local(&root, 7, |_| Some(())), None);
        assert_eq!(find_local(&root, 1, |_| None::<()>), None);
    }
}
