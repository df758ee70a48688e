use super::handles::DeviceIndex;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Finds loops made only of combinational devices with an iterative depth-first search.
///
/// `is_combinational(i)` tells whether device `i` is a gate, `dependents(i)` lists the devices
/// that device `i` drives. Edges into memory, switch or clock devices are never followed,
/// their outputs only change between propagation phases so they act as roots.
///
/// Returns every loop closed by a back edge, each as the devices along it starting and ending
/// with the device the back edge points to.
pub(super) fn combinational_cycles<F, I>(
    len: usize,
    is_combinational: impl Fn(usize) -> bool,
    dependents: F,
) -> Vec<Vec<DeviceIndex>>
where
    F: Fn(usize) -> I,
    I: Iterator<Item = DeviceIndex>,
{
    let mut marks = vec![Mark::Unvisited; len];
    let mut cycles = Vec::new();
    // (device, its dependents not explored yet)
    let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();

    let gate_dependents = |i: usize| -> Vec<usize> {
        let mut next: Vec<usize> = dependents(i)
            .map(|d| d.idx)
            .filter(|d| is_combinational(*d))
            .collect();
        // Popped from the back, explore in connection order.
        next.reverse();
        next
    };

    for root in 0..len {
        if marks[root] != Mark::Unvisited || !is_combinational(root) {
            continue;
        }
        marks[root] = Mark::OnPath;
        stack.push((root, gate_dependents(root)));

        while let Some((device, pending)) = stack.last_mut() {
            let device = *device;
            match pending.pop() {
                Some(next) => match marks[next] {
                    Mark::Unvisited => {
                        marks[next] = Mark::OnPath;
                        stack.push((next, gate_dependents(next)));
                    }
                    Mark::OnPath => {
                        let start = stack
                            .iter()
                            .position(|(d, _)| *d == next)
                            .unwrap_or_default();
                        let mut cycle: Vec<DeviceIndex> =
                            stack[start..].iter().map(|(d, _)| di!(*d)).collect();
                        cycle.push(di!(next));
                        cycles.push(cycle);
                    }
                    Mark::Done => {}
                },
                None => {
                    marks[device] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(
        gates: &[bool],
        edges: &[(usize, usize)],
    ) -> Vec<Vec<usize>> {
        let dependents = |i: usize| {
            edges
                .iter()
                .filter(move |(from, _)| *from == i)
                .map(|(_, to)| di!(*to))
                .collect::<Vec<_>>()
                .into_iter()
        };
        combinational_cycles(gates.len(), |i| gates[i], dependents)
            .into_iter()
            .map(|cycle| cycle.into_iter().map(|d| d.idx).collect())
            .collect()
    }

    #[test]
    fn test_acyclic() {
        let gates = [true, true, true, true];
        let edges = [(0, 1), (0, 2), (1, 3), (2, 3)];
        assert!(find(&gates, &edges).is_empty());
    }

    #[test]
    fn test_self_loop() {
        assert_eq!(find(&[true], &[(0, 0)]), vec![vec![0, 0]]);
    }

    #[test]
    fn test_latch_loop() {
        // 0,1 drive a cross coupled pair 2,3.
        let gates = [true, true, true, true];
        let edges = [(0, 2), (1, 3), (2, 3), (3, 2)];
        assert_eq!(find(&gates, &edges), vec![vec![2, 3, 2]]);
    }

    #[test]
    fn test_loop_through_memory_is_legal() {
        // 1 is a flip-flop: 0 -> 1 -> 2 -> 0
        let gates = [true, false, true];
        let edges = [(0, 1), (1, 2), (2, 0)];
        assert!(find(&gates, &edges).is_empty());
    }
}
