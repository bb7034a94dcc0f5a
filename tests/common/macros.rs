/// Asserts that two vectors are within `eps` of each other on every axis.
#[macro_export]
macro_rules! assert_vec3_near {
    ($actual:expr, $expected:expr, $eps:expr) => {
        let actual = $actual;
        let expected = $expected;
        assert!(
            (actual - expected).abs().max_element() <= $eps,
            "Vector {:?} is not within {} of {:?}",
            actual,
            $eps,
            expected
        );
    };
}

/// Asserts that two matrices agree element-wise within `eps`.
#[macro_export]
macro_rules! assert_mat4_near {
    ($actual:expr, $expected:expr, $eps:expr) => {
        let actual = $actual;
        let expected = $expected;
        assert!(
            actual.abs_diff_eq(expected, $eps),
            "Matrix {:?} is not within {} of {:?}",
            actual,
            $eps,
            expected
        );
    };
}

/// Asserts that channel `$index` of `$part` is fed by `$source`.
#[macro_export]
macro_rules! assert_wired {
    ($tree:expr, ($part:expr, $index:expr), $source:expr) => {
        let channel = &$tree[$part].channels[$index];
        assert_eq!(
            channel.source,
            Some($source),
            "Channel {} of {} is not wired to {:?}",
            $index,
            $tree[$part].name(),
            $source
        );
    };
}

/// Asserts that channel `$index` of `$part` has no upstream.
#[macro_export]
macro_rules! assert_unwired {
    ($tree:expr, ($part:expr, $index:expr)) => {
        let channel = &$tree[$part].channels[$index];
        assert!(
            channel.source.is_none(),
            "Channel {} of {} should be unwired but is fed by {:?}",
            $index,
            $tree[$part].name(),
            channel.source
        );
    };
}
