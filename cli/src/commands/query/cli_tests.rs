//! CLI parsing tests for query command using the test DSL.

#[cfg(test)]
mod tests {
    use crate::cli::Args;
    use clap::Parser;
    use rstest::rstest;

    crate::cli_required_arg_test! {
        command: "query",
        test_name: test_query_requires_sql,
        required_arg: "<SQL>",
    }

    crate::cli_option_test! {
        command: "query",
        variant: Query,
        test_name: test_query_with_sql,
        args: ["SELECT 1"],
        field: sql,
        expected: "SELECT 1",
    }

    crate::cli_option_test! {
        command: "query",
        variant: Query,
        test_name: test_query_without_max_rows,
        args: ["SELECT 1"],
        field: max_rows,
        expected: None,
    }

    crate::cli_option_test! {
        command: "query",
        variant: Query,
        test_name: test_query_with_max_rows,
        args: ["SELECT 1", "--max-rows", "25"],
        field: max_rows,
        expected: Some(25),
    }

    crate::cli_option_test! {
        command: "query",
        variant: Query,
        test_name: test_query_with_short_max_rows,
        args: ["SELECT 1", "-n", "3"],
        field: max_rows,
        expected: Some(3),
    }

    crate::cli_error_test! {
        command: "query",
        test_name: test_query_zero_max_rows_rejected,
        args: ["SELECT 1", "--max-rows", "0"],
    }

    crate::cli_error_test! {
        command: "query",
        test_name: test_query_negative_max_rows_rejected,
        args: ["SELECT 1", "--max-rows", "-4"],
    }
}
