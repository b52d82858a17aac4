use pixmix::{CompositeRegistry, HarnessConfig, harness};

#[test]
fn accelerated_kernels_match_the_reference() {
    let accelerated = CompositeRegistry::with_best_available();
    let baseline = CompositeRegistry::generic();
    let config = HarnessConfig {
        pixels: 1 << 13,
        iterations: 1,
        ..Default::default()
    };
    let report = harness::run(&accelerated, &baseline, &config).unwrap();
    let diverged: Vec<_> = report.cases.iter().filter(|c| !c.passed()).collect();
    assert!(report.all_passed(), "diverged: {diverged:?}");
    assert_eq!(report.failures, 0);
}

#[test]
fn sweep_covers_every_installed_accelerated_entry() {
    let accelerated = CompositeRegistry::with_best_available();
    let baseline = CompositeRegistry::generic();
    let config = HarnessConfig {
        pixels: 64,
        iterations: 1,
        ..Default::default()
    };
    let report = harness::run(&accelerated, &baseline, &config).unwrap();

    let expected = pixmix::CompositeOperation::ALL
        .into_iter()
        .flat_map(|op| {
            pixmix::PixelFormat::ALL.into_iter().flat_map(move |a| {
                pixmix::PixelFormat::ALL.into_iter().flat_map(move |b| {
                    pixmix::PixelFormat::ALL
                        .into_iter()
                        .map(move |d| (op, a, b, d))
                })
            })
        })
        .filter(|&(op, a, b, d)| {
            accelerated
                .kernel_source(op, a, b, d)
                .is_some_and(|set| set != "generic")
        })
        .count();
    assert_eq!(report.cases.len(), expected);
}
