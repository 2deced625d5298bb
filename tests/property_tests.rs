#![allow(missing_docs)]

use proptest::prelude::*;
use quill::query::{
    parse, parse_literal, select, Condition, ConditionKind, Connective, IdentityObserver,
    SelectBuilder, Statement, Value,
};

#[derive(Debug, Clone, Copy)]
enum Op {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
        }
    }

    fn apply(self, builder: SelectBuilder, value: i64) -> SelectBuilder {
        match self {
            Op::Eq => builder.eq(value),
            Op::Gt => builder.gt(value),
            Op::Gte => builder.gte(value),
            Op::Lt => builder.lt(value),
            Op::Lte => builder.lte(value),
        }
    }
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Eq),
        Just(Op::Gt),
        Just(Op::Gte),
        Just(Op::Lt),
        Just(Op::Lte),
    ]
}

fn arb_connective() -> impl Strategy<Value = Connective> {
    prop_oneof![Just(Connective::And), Just(Connective::Or)]
}

/// Field names that never collide with DSL keywords.
fn arb_field() -> impl Strategy<Value = String> {
    "f_[a-z]{1,6}"
}

fn arb_comparison() -> impl Strategy<Value = (String, Op, i64)> {
    (arb_field(), arb_op(), any::<i64>())
}

fn depth(condition: &Condition) -> usize {
    1 + condition.children().iter().map(depth).max().unwrap_or(0)
}

proptest! {
    #[test]
    fn prop_parser_never_panics(input in any::<String>()) {
        let _ = parse(&input, &IdentityObserver);
        let _ = parse_literal(&input);
    }

    #[test]
    fn prop_parser_never_panics_after_command(
        command in prop_oneof![Just("select "), Just("delete "), Just("insert "), Just("update ")],
        tail in "[ -~]{0,64}",
    ) {
        let _ = parse(&format!("{command}{tail}"), &IdentityObserver);
    }

    #[test]
    fn prop_builder_matches_parser(
        entity in "[A-Z][a-z]{0,8}",
        first in arb_comparison(),
        rest in prop::collection::vec((arb_connective(), arb_comparison()), 0..6),
        limit in 0u64..100,
    ) {
        let mut text = format!("select * from {entity} where {} {} {}", first.0, first.1.symbol(), first.2);
        let mut builder = first.1.apply(select().from(entity.clone()).r#where(first.0.clone()), first.2);
        for (connective, (field, op, value)) in &rest {
            let word = match connective {
                Connective::And => "and",
                Connective::Or => "or",
            };
            text.push_str(&format!(" {word} {field} {} {value}", op.symbol()));
            builder = match connective {
                Connective::And => op.apply(builder.and(field.clone()), *value),
                Connective::Or => op.apply(builder.or(field.clone()), *value),
            };
        }
        if limit > 0 {
            text.push_str(&format!(" limit {limit}"));
            builder = builder.limit(limit);
        }

        let parsed = parse(&text, &IdentityObserver).unwrap().statement;
        let built = Statement::Select(builder.build().unwrap());
        prop_assert_eq!(parsed, built);
    }

    #[test]
    fn prop_chains_stay_shallow(
        first in arb_comparison(),
        rest in prop::collection::vec((arb_connective(), arb_comparison()), 0..12),
    ) {
        let mut condition = Condition::compare(
            first.1.kind(),
            quill::query::Column::new(first.0, first.2),
        ).unwrap();
        let mut switches = 0;
        let mut previous = None;
        for (connective, (field, op, value)) in rest {
            if previous.is_some_and(|prev| prev != connective) {
                switches += 1;
            }
            previous = Some(connective);
            let next = Condition::compare(op.kind(), quill::query::Column::new(field, value)).unwrap();
            condition = condition.combine(connective, next);
        }
        let expected = if previous.is_some() { switches + 2 } else { 1 };
        prop_assert_eq!(depth(&condition), expected);
    }

    #[test]
    fn prop_int_literals_parse_exactly(value in any::<i64>()) {
        prop_assert_eq!(parse_literal(&value.to_string()).unwrap(), Value::Int(value));
    }

    #[test]
    fn prop_double_negation_unwraps(field in arb_field(), value in any::<i64>()) {
        let leaf = Condition::eq(quill::query::Column::new(field, value));
        prop_assert_eq!(leaf.clone().negate().negate(), leaf);
    }
}

impl Op {
    fn kind(self) -> ConditionKind {
        match self {
            Op::Eq => ConditionKind::Equals,
            Op::Gt => ConditionKind::GreaterThan,
            Op::Gte => ConditionKind::GreaterEqualsThan,
            Op::Lt => ConditionKind::LesserThan,
            Op::Lte => ConditionKind::LesserEqualsThan,
        }
    }
}
