use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use vcpusched::{Balancer, DomainHandle, DomainStat, SimDomainSpec, SimulatedHost};

/// Stats with a deterministic spread of shares, ids matching `sim_host_with`.
fn synthetic_stats(domains: usize) -> Vec<DomainStat> {
    (0..domains)
        .map(|i| {
            let mut stat =
                DomainStat::new(DomainHandle::new(i as u32 + 1, format!("vm{:03}", i + 1)));
            stat.current_percent_used = ((i * 37) % 101) as u32;
            stat.sampled = true;
            stat.ticks_sampled = 2;
            stat
        })
        .collect()
}

fn sim_host_with(domains: usize, pcpus: usize) -> SimulatedHost {
    let host = SimulatedHost::new(pcpus);
    for i in 0..domains {
        host.add_domain(SimDomainSpec::new(format!("vm{:03}", i + 1), vec![100]));
    }
    host
}

fn bench_rebalance(c: &mut Criterion) {
    for (domains, pcpus) in [(32, 4), (256, 16), (1024, 64)] {
        let host = sim_host_with(domains, pcpus);
        let stats = synthetic_stats(domains);

        c.bench_function(
            &format!("rebalance {} domains over {} pcpus", domains, pcpus),
            |b| {
                b.iter_batched(
                    || stats.clone(),
                    |mut stats| {
                        let report = Balancer::new().rebalance(&host, &mut stats, pcpus);
                        black_box(report)
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }
}

criterion_group!(benches, bench_rebalance);
criterion_main!(benches);
