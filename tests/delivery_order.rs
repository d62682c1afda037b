// tests/delivery_order.rs

use proptest::prelude::*;

use rcontrol::exec::CommandTask;
use rcontrol::types::TaskState;
use rcontrol::StreamOrigin;
use rcontrol_test_utils::{recording_options, FakeProcess, RecordingSink};

fn lines_strategy() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z0-9 ]{0,12}", 0..200)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_line_is_delivered_once_in_stream_order(
        stdout in lines_strategy(),
        stderr in lines_strategy(),
        combine in any::<bool>(),
    ) {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let sink = RecordingSink::new();
        let state = rt.block_on(async {
            let process = FakeProcess::exiting_with(0)
                .stdout_lines(&stdout[..])
                .stderr_lines(&stderr[..]);
            let task = CommandTask::start(
                "fake",
                Box::new(process),
                recording_options(&sink).combine_stderr(combine),
            );
            task.wait(None).await
        });

        prop_assert_eq!(state, TaskState::Finished { exit_code: 0 });
        prop_assert_eq!(sink.lines(StreamOrigin::Stdout), stdout);
        if combine {
            prop_assert_eq!(sink.count(StreamOrigin::Stderr), 0);
        } else {
            prop_assert_eq!(sink.lines(StreamOrigin::Stderr), stderr);
        }
    }
}
