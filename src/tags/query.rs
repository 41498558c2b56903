//! Byte-coded tag queries.
//!
//! A query is authored as an expression tree, then flattened into a
//! token stream plus a small tag dictionary local to the query. The
//! stream is evaluated in a single pass; short-circuiting is expressed
//! through a skip flag that keeps consuming tokens (so the cursor stays
//! aligned) without performing matches.
//!
//! Opcodes 1-6 are tag-set predicates (any/all/none, with-hierarchy and
//! exact variants); opcodes 7-9 combine nested sub-expressions.

use bevy::prelude::*;

use super::container::TagContainer;
use super::tag::GameplayTag;

const OP_ANY_TAGS: u8 = 1;
const OP_ALL_TAGS: u8 = 2;
const OP_NO_TAGS: u8 = 3;
const OP_ANY_TAGS_EXACT: u8 = 4;
const OP_ALL_TAGS_EXACT: u8 = 5;
const OP_NO_TAGS_EXACT: u8 = 6;
const OP_ANY_EXPRESSIONS: u8 = 7;
const OP_ALL_EXPRESSIONS: u8 = 8;
const OP_NO_EXPRESSIONS: u8 = 9;

/// Authoring-time query expression.
///
/// Flatten one of these into a [`TagQuery`] with
/// [`TagQuery::from_expression`].
#[derive(Debug, Clone, PartialEq)]
pub enum TagQueryExpression {
    /// At least one listed tag is in the container (hierarchy).
    AnyTagsMatch(Vec<GameplayTag>),
    /// Every listed tag is in the container (hierarchy).
    AllTagsMatch(Vec<GameplayTag>),
    /// No listed tag is in the container (hierarchy).
    NoTagsMatch(Vec<GameplayTag>),
    /// At least one listed tag is in the container, exact.
    AnyTagsMatchExact(Vec<GameplayTag>),
    /// Every listed tag is in the container, exact.
    AllTagsMatchExact(Vec<GameplayTag>),
    /// No listed tag is in the container, exact.
    NoTagsMatchExact(Vec<GameplayTag>),
    /// At least one sub-expression matches.
    AnyExpressionsMatch(Vec<TagQueryExpression>),
    /// Every sub-expression matches.
    AllExpressionsMatch(Vec<TagQueryExpression>),
    /// No sub-expression matches.
    NoExpressionsMatch(Vec<TagQueryExpression>),
}

/// A flattened, evaluable tag query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagQuery {
    token_stream: Vec<u8>,
    tag_dictionary: Vec<GameplayTag>,
}

impl TagQuery {
    /// The query that matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Flattens an expression tree into a token stream and dictionary.
    pub fn from_expression(expression: TagQueryExpression) -> Self {
        let mut query = TagQuery {
            token_stream: vec![1],
            tag_dictionary: Vec::new(),
        };
        query.flatten(&expression);
        query
    }

    /// Matches any tag of `tags`, with hierarchy.
    pub fn match_any_tags(tags: &TagContainer) -> Self {
        Self::from_expression(TagQueryExpression::AnyTagsMatch(collect(tags)))
    }

    /// Matches any tag of `tags`, exact.
    pub fn match_any_tags_exact(tags: &TagContainer) -> Self {
        Self::from_expression(TagQueryExpression::AnyTagsMatchExact(collect(tags)))
    }

    /// Matches all tags of `tags`, with hierarchy.
    pub fn match_all_tags(tags: &TagContainer) -> Self {
        Self::from_expression(TagQueryExpression::AllTagsMatch(collect(tags)))
    }

    /// Matches all tags of `tags`, exact.
    pub fn match_all_tags_exact(tags: &TagContainer) -> Self {
        Self::from_expression(TagQueryExpression::AllTagsMatchExact(collect(tags)))
    }

    /// Matches when no tag of `tags` is present, with hierarchy.
    pub fn match_no_tags(tags: &TagContainer) -> Self {
        Self::from_expression(TagQueryExpression::NoTagsMatch(collect(tags)))
    }

    /// Matches when no tag of `tags` is present, exact.
    pub fn match_no_tags_exact(tags: &TagContainer) -> Self {
        Self::from_expression(TagQueryExpression::NoTagsMatchExact(collect(tags)))
    }

    /// Matches a single tag, with hierarchy.
    pub fn match_tag(tag: GameplayTag) -> Self {
        Self::from_expression(TagQueryExpression::AnyTagsMatch(vec![tag]))
    }

    /// Matches a single tag, exact.
    pub fn match_tag_exact(tag: GameplayTag) -> Self {
        Self::from_expression(TagQueryExpression::AnyTagsMatchExact(vec![tag]))
    }

    /// True when the query has no expression and so matches nothing.
    pub fn is_empty(&self) -> bool {
        self.token_stream.first().copied().unwrap_or(0) == 0
    }

    /// Replaces the whole tag dictionary with the tags of `container`
    /// without touching the token stream. The cardinality must match
    /// the existing dictionary.
    pub fn replace_tags_fast(&mut self, container: &TagContainer) {
        debug_assert_eq!(
            self.tag_dictionary.len(),
            container.len(),
            "replace_tags_fast requires a same-sized container"
        );
        self.tag_dictionary = collect(container);
    }

    /// Replaces a single-tag dictionary with `tag`.
    pub fn replace_tag_fast(&mut self, tag: GameplayTag) {
        debug_assert_eq!(
            self.tag_dictionary.len(),
            1,
            "replace_tag_fast requires a single-tag dictionary"
        );
        self.tag_dictionary = vec![tag];
    }

    /// Evaluates the query against a container.
    ///
    /// A malformed stream never panics: it logs and evaluates to false.
    pub fn matches(&self, container: &TagContainer) -> bool {
        if self.is_empty() {
            return false;
        }
        let mut reader = StreamReader {
            bytes: &self.token_stream,
            pos: 1,
            bad: false,
        };
        let result = eval_expression(&mut reader, &self.tag_dictionary, container, false);
        if reader.bad {
            warn!("malformed tag query stream, evaluating to false");
            return false;
        }
        result
    }

    fn flatten(&mut self, expression: &TagQueryExpression) {
        use TagQueryExpression::*;
        match expression {
            AnyTagsMatch(tags) => self.flatten_tag_set(OP_ANY_TAGS, tags),
            AllTagsMatch(tags) => self.flatten_tag_set(OP_ALL_TAGS, tags),
            NoTagsMatch(tags) => self.flatten_tag_set(OP_NO_TAGS, tags),
            AnyTagsMatchExact(tags) => self.flatten_tag_set(OP_ANY_TAGS_EXACT, tags),
            AllTagsMatchExact(tags) => self.flatten_tag_set(OP_ALL_TAGS_EXACT, tags),
            NoTagsMatchExact(tags) => self.flatten_tag_set(OP_NO_TAGS_EXACT, tags),
            AnyExpressionsMatch(exprs) => self.flatten_expression_set(OP_ANY_EXPRESSIONS, exprs),
            AllExpressionsMatch(exprs) => self.flatten_expression_set(OP_ALL_EXPRESSIONS, exprs),
            NoExpressionsMatch(exprs) => self.flatten_expression_set(OP_NO_EXPRESSIONS, exprs),
        }
    }

    fn flatten_tag_set(&mut self, opcode: u8, tags: &[GameplayTag]) {
        self.token_stream.push(opcode);
        self.token_stream.push(tags.len() as u8);
        for tag in tags {
            let index = self.intern(tag);
            self.token_stream.push(index);
        }
    }

    fn flatten_expression_set(&mut self, opcode: u8, expressions: &[TagQueryExpression]) {
        self.token_stream.push(opcode);
        self.token_stream.push(expressions.len() as u8);
        for expression in expressions {
            self.flatten(expression);
        }
    }

    fn intern(&mut self, tag: &GameplayTag) -> u8 {
        if let Some(index) = self.tag_dictionary.iter().position(|t| t == tag) {
            return index as u8;
        }
        self.tag_dictionary.push(tag.clone());
        (self.tag_dictionary.len() - 1) as u8
    }
}

fn collect(container: &TagContainer) -> Vec<GameplayTag> {
    container.iter().cloned().collect()
}

struct StreamReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    bad: bool,
}

impl StreamReader<'_> {
    fn read(&mut self) -> u8 {
        match self.bytes.get(self.pos) {
            Some(&byte) => {
                self.pos += 1;
                byte
            }
            None => {
                self.bad = true;
                0
            }
        }
    }
}

fn eval_expression(
    reader: &mut StreamReader<'_>,
    dictionary: &[GameplayTag],
    container: &TagContainer,
    skip: bool,
) -> bool {
    let opcode = reader.read();
    match opcode {
        OP_ANY_TAGS..=OP_NO_TAGS_EXACT => {
            eval_tag_set(reader, dictionary, container, skip, opcode)
        }
        OP_ANY_EXPRESSIONS..=OP_NO_EXPRESSIONS => {
            eval_expression_set(reader, dictionary, container, skip, opcode)
        }
        _ => {
            reader.bad = true;
            false
        }
    }
}

fn eval_tag_set(
    reader: &mut StreamReader<'_>,
    dictionary: &[GameplayTag],
    container: &TagContainer,
    skip: bool,
    opcode: u8,
) -> bool {
    let count = reader.read();
    let exact = matches!(opcode, OP_ANY_TAGS_EXACT | OP_ALL_TAGS_EXACT | OP_NO_TAGS_EXACT);
    // Any starts pessimistic; All and No start optimistic.
    let mut result = !matches!(opcode, OP_ANY_TAGS | OP_ANY_TAGS_EXACT);
    let mut skipping = skip;

    for _ in 0..count {
        let index = reader.read() as usize;
        if skipping || reader.bad {
            continue;
        }
        let matched = match dictionary.get(index) {
            Some(tag) if exact => container.has_tag_exact(tag),
            Some(tag) => container.has_tag(tag),
            None => {
                reader.bad = true;
                continue;
            }
        };
        match opcode {
            OP_ANY_TAGS | OP_ANY_TAGS_EXACT if matched => {
                result = true;
                skipping = true;
            }
            OP_ALL_TAGS | OP_ALL_TAGS_EXACT if !matched => {
                result = false;
                skipping = true;
            }
            OP_NO_TAGS | OP_NO_TAGS_EXACT if matched => {
                result = false;
                skipping = true;
            }
            _ => {}
        }
    }
    result
}

fn eval_expression_set(
    reader: &mut StreamReader<'_>,
    dictionary: &[GameplayTag],
    container: &TagContainer,
    skip: bool,
    opcode: u8,
) -> bool {
    let count = reader.read();
    let mut result = opcode != OP_ANY_EXPRESSIONS;
    let mut skipping = skip;

    for _ in 0..count {
        // Nested expressions are always walked so the cursor stays
        // aligned; only their verdicts are ignored while skipping.
        let sub = eval_expression(reader, dictionary, container, skipping);
        if skipping || reader.bad {
            continue;
        }
        match opcode {
            OP_ANY_EXPRESSIONS if sub => {
                result = true;
                skipping = true;
            }
            OP_ALL_EXPRESSIONS if !sub => {
                result = false;
                skipping = true;
            }
            OP_NO_EXPRESSIONS if sub => {
                result = false;
                skipping = true;
            }
            _ => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(key: &str) -> GameplayTag {
        GameplayTag::from_normalized(key)
    }

    fn container(keys: &[&str]) -> TagContainer {
        TagContainer::from_tags(keys.iter().map(|k| tag(k)))
    }

    #[test]
    fn any_all_no_tag_sets() {
        let red_blue = container(&["color.red", "color.blue"]);

        let any = TagQuery::match_any_tags(&container(&["color.red"]));
        let all = TagQuery::match_all_tags(&red_blue);
        let none = TagQuery::match_no_tags(&container(&["color.green"]));

        assert!(red_blue.matches_query(&any));
        assert!(red_blue.matches_query(&all));
        assert!(red_blue.matches_query(&none));

        let red_only = container(&["color.red"]);
        assert!(!red_only.matches_query(&all));
        assert!(red_only.matches_query(&none));
        assert!(!red_only.matches_query(&TagQuery::match_no_tags(&red_only)));
    }

    #[test]
    fn hierarchy_vs_exact() {
        let zombie = container(&["enemy.undead.zombie"]);
        let enemy = container(&["enemy"]);

        assert!(zombie.matches_query(&TagQuery::match_any_tags(&enemy)));
        assert!(!zombie.matches_query(&TagQuery::match_any_tags_exact(&enemy)));
        assert!(zombie.matches_query(&TagQuery::match_tag(tag("enemy.undead"))));
        assert!(!zombie.matches_query(&TagQuery::match_tag_exact(tag("enemy.undead"))));
    }

    #[test]
    fn nested_expression_sets() {
        // All of: any of {red, blue}, and none of: (all of {red, blue}),
        // (any of {green}).
        let query = TagQuery::from_expression(TagQueryExpression::AllExpressionsMatch(vec![
            TagQueryExpression::AnyTagsMatch(vec![tag("color.red"), tag("color.blue")]),
            TagQueryExpression::NoExpressionsMatch(vec![
                TagQueryExpression::AllTagsMatch(vec![tag("color.red"), tag("color.blue")]),
                TagQueryExpression::AnyTagsMatch(vec![tag("color.green")]),
            ]),
        ]));

        assert!(container(&["color.red"]).matches_query(&query));
        assert!(container(&["color.blue"]).matches_query(&query));
        assert!(!container(&["color.red", "color.blue"]).matches_query(&query));
        assert!(!container(&["color.red", "color.green"]).matches_query(&query));
        assert!(!container(&["color.yellow"]).matches_query(&query));
    }

    #[test]
    fn empty_query_matches_nothing() {
        let query = TagQuery::empty();

        assert!(!container(&["enemy"]).matches_query(&query));
        assert!(!TagContainer::new().matches_query(&query));
    }

    #[test]
    fn empty_container_matches_only_negated_roots() {
        let empty = TagContainer::new();
        let some = container(&["color.red"]);

        assert!(!empty.matches_query(&TagQuery::match_any_tags(&some)));
        assert!(!empty.matches_query(&TagQuery::match_all_tags(&some)));
        assert!(empty.matches_query(&TagQuery::match_no_tags(&some)));
        assert!(empty.matches_query(&TagQuery::match_no_tags_exact(&some)));
    }

    #[test]
    fn replace_tags_fast_preserves_semantics() {
        let original = container(&["color.red", "color.blue"]);
        let replacement = container(&["shape.circle", "shape.square"]);

        let mut query = TagQuery::match_all_tags(&original);
        query.replace_tags_fast(&replacement);

        let fresh = TagQuery::match_all_tags(&replacement);
        let subject = container(&["shape.circle", "shape.square", "extra"]);
        let partial = container(&["shape.circle"]);

        assert_eq!(query.matches(&subject), fresh.matches(&subject));
        assert_eq!(query.matches(&partial), fresh.matches(&partial));
        assert!(query.matches(&subject));
        assert!(!query.matches(&partial));
    }

    #[test]
    fn replace_tag_fast_swaps_single_tag() {
        let mut query = TagQuery::match_tag(tag("enemy.undead"));
        query.replace_tag_fast(tag("ally.human"));

        assert!(container(&["ally.human.knight"]).matches_query(&query));
        assert!(!container(&["enemy.undead"]).matches_query(&query));
    }

    #[test]
    fn malformed_stream_is_false_not_panic() {
        let query = TagQuery {
            token_stream: vec![1, OP_ANY_TAGS, 3, 0],
            tag_dictionary: vec![tag("enemy")],
        };

        assert!(!container(&["enemy"]).matches_query(&query));

        let unknown_opcode = TagQuery {
            token_stream: vec![1, 42, 1, 0],
            tag_dictionary: vec![tag("enemy")],
        };
        assert!(!container(&["enemy"]).matches_query(&unknown_opcode));
    }

    #[test]
    fn skip_flag_keeps_cursor_aligned() {
        // The first sub-expression of an Any short-circuits; the second
        // must still be parsed correctly for the overall result to hold.
        let query = TagQuery::from_expression(TagQueryExpression::AllExpressionsMatch(vec![
            TagQueryExpression::AnyExpressionsMatch(vec![
                TagQueryExpression::AnyTagsMatch(vec![tag("a")]),
                TagQueryExpression::AllTagsMatch(vec![tag("b"), tag("c")]),
            ]),
            TagQueryExpression::NoTagsMatch(vec![tag("d")]),
        ]));

        assert!(container(&["a"]).matches_query(&query));
        assert!(!container(&["a", "d"]).matches_query(&query));
        assert!(container(&["b", "c"]).matches_query(&query));
    }
}
